//! Group membership walks against an in-memory directory.

mod common;

use common::{MockDirectory, BASE_DN};
use ldap_whoami::record::{DirectoryRecord, GroupSet};
use ldap_whoami::walker::GroupWalker;
use ldap_whoami::WhoamiError;

fn names(groups: &GroupSet) -> Vec<&str> {
    let mut names: Vec<&str> = groups.iter().map(|g| g.account_name.as_str()).collect();
    names.sort_unstable();
    names
}

#[tokio::test]
async fn test_acyclic_closure_expands_each_group_once() {
    // jdoe -> G1 -> G2, jdoe -> G3 -> G2
    let mut dir = MockDirectory::new("u:EXAMPLE\\jdoe");
    let user = dir.add_user("jdoe", 1105, 513);
    let g1 = dir.add_group("G1", 2001);
    let g2 = dir.add_group("G2", 2002);
    let g3 = dir.add_group("G3", 2003);
    dir.add_member(&g1, &user);
    dir.add_member(&g3, &user);
    dir.add_member(&g2, &g1);
    dir.add_member(&g2, &g3);

    let outcome = GroupWalker::new(&mut dir, BASE_DN)
        .walk(&[user.clone()], GroupSet::new())
        .await
        .unwrap();

    assert_eq!(names(&outcome.groups), vec!["G1", "G2", "G3"]);
    for dn in [&user, &g1, &g2, &g3] {
        assert_eq!(dir.member_search_count(dn), 1, "{} expanded once", dn);
    }
    assert_eq!(outcome.stats.searches, 4);
    assert_eq!(outcome.stats.groups_discovered, 3);
    assert_eq!(outcome.stats.revisits, 1);
}

#[tokio::test]
async fn test_cycle_terminates() {
    let mut dir = MockDirectory::new("u:EXAMPLE\\jdoe");
    let user = dir.add_user("jdoe", 1105, 513);
    let a = dir.add_group("A", 2001);
    let b = dir.add_group("B", 2002);
    dir.add_member(&a, &user);
    dir.add_member(&b, &a);
    dir.add_member(&a, &b);

    let outcome = GroupWalker::new(&mut dir, BASE_DN)
        .walk(&[user], GroupSet::new())
        .await
        .unwrap();

    assert_eq!(names(&outcome.groups), vec!["A", "B"]);
    assert_eq!(dir.total_member_searches(), 3);
    assert_eq!(outcome.stats.revisits, 1);
}

#[tokio::test]
async fn test_group_member_of_itself() {
    let mut dir = MockDirectory::new("u:EXAMPLE\\jdoe");
    let user = dir.add_user("jdoe", 1105, 513);
    let g = dir.add_group("Loop", 2001);
    dir.add_member(&g, &user);
    dir.add_member(&g, &g);

    let outcome = GroupWalker::new(&mut dir, BASE_DN)
        .walk(&[user], GroupSet::new())
        .await
        .unwrap();

    assert_eq!(names(&outcome.groups), vec!["Loop"]);
    assert_eq!(dir.member_search_count(&g), 1);
}

#[tokio::test]
async fn test_no_groups() {
    let mut dir = MockDirectory::new("u:EXAMPLE\\jdoe");
    let user = dir.add_user("jdoe", 1105, 513);

    let outcome = GroupWalker::new(&mut dir, BASE_DN)
        .walk(&[user], GroupSet::new())
        .await
        .unwrap();

    assert!(outcome.groups.is_empty());
    assert_eq!(outcome.stats.searches, 1);
}

#[tokio::test]
async fn test_seeded_group_is_not_expanded() {
    let mut dir = MockDirectory::new("u:EXAMPLE\\jdoe");
    let user = dir.add_user("jdoe", 1105, 513);
    let primary = dir.add_group("Domain Users", 513);
    let outer = dir.add_group("Outer", 2001);
    dir.add_member(&primary, &user);
    dir.add_member(&outer, &primary);

    let mut seed = GroupSet::new();
    seed.insert(DirectoryRecord {
        distinguished_name: primary.clone(),
        account_name: "Domain Users".to_string(),
        security_identifier: dir.sid_of(513),
    });

    let outcome = GroupWalker::new(&mut dir, BASE_DN)
        .walk(&[user], seed)
        .await
        .unwrap();

    assert_eq!(names(&outcome.groups), vec!["Domain Users"]);
    assert_eq!(dir.member_search_count(&primary), 0);
    assert_eq!(outcome.stats.revisits, 1);
}

#[tokio::test]
async fn test_seeded_start_is_expanded_once() {
    let mut dir = MockDirectory::new("u:EXAMPLE\\jdoe");
    let user = dir.add_user("jdoe", 1105, 513);
    let primary = dir.add_group("Domain Users", 513);
    let outer = dir.add_group("Outer", 2001);
    dir.add_member(&primary, &user);
    dir.add_member(&outer, &primary);

    let mut seed = GroupSet::new();
    seed.insert(DirectoryRecord {
        distinguished_name: primary.clone(),
        account_name: "Domain Users".to_string(),
        security_identifier: dir.sid_of(513),
    });

    let outcome = GroupWalker::new(&mut dir, BASE_DN)
        .walk(&[user.clone(), primary.clone()], seed)
        .await
        .unwrap();

    assert_eq!(names(&outcome.groups), vec!["Domain Users", "Outer"]);
    assert_eq!(dir.member_search_count(&user), 1);
    assert_eq!(dir.member_search_count(&primary), 1);
    assert_eq!(dir.member_search_count(&outer), 1);
}

#[tokio::test]
async fn test_search_failure_aborts_walk() {
    let mut dir = MockDirectory::new("u:EXAMPLE\\jdoe");
    let user = dir.add_user("jdoe", 1105, 513);
    let g1 = dir.add_group("G1", 2001);
    let g2 = dir.add_group("G2", 2002);
    dir.add_member(&g1, &user);
    dir.add_member(&g2, &g1);
    dir.fail_member_search_for = Some(g1.clone());

    let result = GroupWalker::new(&mut dir, BASE_DN)
        .walk(&[user], GroupSet::new())
        .await;

    assert!(matches!(result, Err(WhoamiError::Directory(_))));
    assert_eq!(dir.member_search_count(&g2), 0);
}

#[tokio::test]
async fn test_member_dn_is_escaped() {
    let mut dir = MockDirectory::new("u:EXAMPLE\\jdoe");
    let user = dir.add_user("jdoe (contractor)", 1105, 513);
    let g1 = dir.add_group("G1", 2001);
    dir.add_member(&g1, &user);

    let outcome = GroupWalker::new(&mut dir, BASE_DN)
        .walk(&[user.clone()], GroupSet::new())
        .await
        .unwrap();

    assert_eq!(names(&outcome.groups), vec!["G1"]);
    let (_, filter) = &dir.searches[0];
    assert!(filter.contains("jdoe \\28contractor\\29"));
}
