//! LDAP session over ldap3
//!
//! One connection, one bind, then strictly sequential requests. Every
//! round-trip is bounded by the configured operation timeout so an
//! unresponsive server cannot hang the run. Failures are reported once and
//! never retried.

use async_trait::async_trait;
use ldap3::adapters::{Adapter, EntriesOnly, PagedResults};
use ldap3::exop::WhoAmI;
use ldap3::{Ldap, LdapConnAsync, LdapConnSettings, LdapError, Scope, SearchEntry};
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::config::{AuthMethod, RunConfig};
use crate::directory::{DirectorySession, WHOAMI_OID};
use crate::errors::{Result, WhoamiError};
use crate::secure_types::Credentials;

/// Unbind is best effort
const UNBIND_TIMEOUT: Duration = Duration::from_secs(5);

/// Awaits an ldap3 operation for at most `limit`.
async fn bounded<T, F>(limit: Duration, what: &str, operation: F) -> Result<T>
where
    F: Future<Output = std::result::Result<T, LdapError>>,
{
    match timeout(limit, operation).await {
        Ok(result) => result.map_err(WhoamiError::from),
        Err(_) => {
            error!("{} timed out after {}s", what, limit.as_secs());
            Err(WhoamiError::Timeout(format!(
                "{} did not complete within {} seconds",
                what,
                limit.as_secs()
            )))
        }
    }
}

fn require_credentials<'c>(config: &'c RunConfig, method: &str) -> Result<&'c Credentials> {
    config
        .credentials
        .as_ref()
        .filter(|c| !c.is_empty())
        .ok_or_else(|| {
            WhoamiError::Config(format!(
                "{} authentication needs a bind name and password",
                method
            ))
        })
}

/// The explicit bind Negotiate uses when Kerberos is not compiled in or failed.
fn negotiate_fallback(config: &RunConfig) -> Result<AuthMethod> {
    if !config.credentials.as_ref().is_some_and(|c| !c.is_empty()) {
        return Err(WhoamiError::Config(
            "Negotiate without --bind-user binds as the current logon, which needs a build \
             with `--features gssapi`"
                .to_string(),
        ));
    }
    if cfg!(feature = "ntlm") {
        Ok(AuthMethod::Ntlm)
    } else {
        Ok(AuthMethod::Simple)
    }
}

/// A bound connection to one directory server
pub struct LdapSession {
    ldap: Ldap,
    url: String,
    operation_timeout: Duration,
    page_size: i32,
}

impl LdapSession {
    /// Connects to `config.server` and binds with `config.auth`.
    pub async fn connect(config: &RunConfig) -> Result<Self> {
        let url = config.ldap_url();
        info!(
            "Connecting to LDAP server: {} (LDAPS: {}, StartTLS: {})",
            url,
            config.use_ldaps(),
            config.use_starttls
        );

        let settings = LdapConnSettings::new()
            .set_conn_timeout(config.connect_timeout)
            .set_starttls(config.use_starttls && !config.use_ldaps())
            .set_no_tls_verify(!config.tls_verify);

        let (conn, ldap) = bounded(
            config.connect_timeout,
            "Connection",
            LdapConnAsync::with_settings(settings, &url),
        )
        .await
        .map_err(|e| match e {
            WhoamiError::Directory(msg) => WhoamiError::Connection(msg),
            other => other,
        })?;

        tokio::spawn(async move {
            if let Err(e) = conn.drive().await {
                warn!("LDAP connection error: {}", e);
            }
        });

        let mut session = Self {
            ldap,
            url,
            operation_timeout: config.operation_timeout,
            page_size: config.page_size,
        };
        session.bind(config).await?;
        info!("Connected and bound to {} ({})", session.url, config.auth);
        Ok(session)
    }

    async fn bind(&mut self, config: &RunConfig) -> Result<()> {
        match config.auth {
            AuthMethod::Anonymous => {
                debug!("Skipping bind, using anonymous session");
                Ok(())
            }
            AuthMethod::Simple => self.simple_bind(config).await,
            AuthMethod::Kerberos => self.kerberos_bind(config).await,
            AuthMethod::Ntlm => self.ntlm_bind(config).await,
            AuthMethod::Negotiate => self.negotiate_bind(config).await,
        }
    }

    async fn simple_bind(&mut self, config: &RunConfig) -> Result<()> {
        let creds = require_credentials(config, "Simple")?;
        bounded(
            self.operation_timeout,
            "Simple bind",
            self.ldap.simple_bind(creds.bind_name(), creds.password()),
        )
        .await?
        .success()?;
        Ok(())
    }

    #[cfg(feature = "gssapi")]
    async fn kerberos_bind(&mut self, config: &RunConfig) -> Result<()> {
        let host = config.server_host().to_string();
        debug!("SASL GSSAPI bind for ldap/{}", host);
        bounded(
            self.operation_timeout,
            "Kerberos bind",
            self.ldap.sasl_gssapi_bind(&host),
        )
        .await?
        .success()?;
        Ok(())
    }

    #[cfg(not(feature = "gssapi"))]
    async fn kerberos_bind(&mut self, _config: &RunConfig) -> Result<()> {
        Err(WhoamiError::Config(
            "Kerberos authentication requires the `gssapi` feature".to_string(),
        ))
    }

    #[cfg(feature = "ntlm")]
    async fn ntlm_bind(&mut self, config: &RunConfig) -> Result<()> {
        let creds = require_credentials(config, "NTLM")?;
        bounded(
            self.operation_timeout,
            "NTLM bind",
            self.ldap.sasl_ntlm_bind(creds.bind_name(), creds.password()),
        )
        .await?
        .success()?;
        Ok(())
    }

    #[cfg(not(feature = "ntlm"))]
    async fn ntlm_bind(&mut self, _config: &RunConfig) -> Result<()> {
        Err(WhoamiError::Config(
            "NTLM authentication requires the `ntlm` feature".to_string(),
        ))
    }

    /// Kerberos first when compiled in, then whatever the given credentials allow.
    async fn negotiate_bind(&mut self, config: &RunConfig) -> Result<()> {
        let has_credentials = config.credentials.as_ref().is_some_and(|c| !c.is_empty());

        if cfg!(feature = "gssapi") {
            match self.kerberos_bind(config).await {
                Ok(()) => return Ok(()),
                Err(e) if has_credentials => {
                    warn!("Kerberos bind failed ({}), falling back to credentials", e)
                }
                Err(e) => return Err(e),
            }
        }

        match negotiate_fallback(config)? {
            AuthMethod::Ntlm => self.ntlm_bind(config).await,
            _ => self.simple_bind(config).await,
        }
    }

    async fn paged_search(
        &mut self,
        base_dn: &str,
        filter: &str,
        scope: Scope,
        attrs: &[&str],
    ) -> Result<Vec<SearchEntry>> {
        let page_size = self.page_size;
        let ldap = &mut self.ldap;

        bounded(self.operation_timeout, "Paged LDAP search", async move {
            let adapters: Vec<Box<dyn Adapter<_, _>>> = vec![
                Box::new(EntriesOnly::new()),
                Box::new(PagedResults::new(page_size)),
            ];
            let mut stream = ldap
                .streaming_search_with(adapters, base_dn, scope, filter, attrs.to_vec())
                .await?;

            let mut entries = Vec::new();
            while let Some(entry) = stream.next().await? {
                entries.push(SearchEntry::construct(entry));
            }
            stream.finish().await.success()?;
            Ok(entries)
        })
        .await
    }

    /// Unbinds, giving up quietly if the server does not answer.
    pub async fn close(mut self) {
        match timeout(UNBIND_TIMEOUT, self.ldap.unbind()).await {
            Ok(Ok(())) => debug!("Unbound from {}", self.url),
            Ok(Err(e)) => warn!("Unbind failed: {}", e),
            Err(_) => warn!("Unbind timed out (connection will be dropped)"),
        }
    }
}

#[async_trait]
impl DirectorySession for LdapSession {
    async fn who_am_i(&mut self) -> Result<String> {
        debug!("Sending extended operation {}", WHOAMI_OID);
        let (exop, _res) = bounded(
            self.operation_timeout,
            "Who-am-I operation",
            self.ldap.extended(WhoAmI),
        )
        .await?
        .success()?;

        let value = exop.val.unwrap_or_default();
        Ok(String::from_utf8_lossy(&value).into_owned())
    }

    async fn search(
        &mut self,
        base_dn: &str,
        filter: &str,
        scope: Scope,
        attrs: &[&str],
    ) -> Result<Vec<SearchEntry>> {
        debug!("Searching {} with filter {}", base_dn, filter);

        let entries = match scope {
            // RootDSE and single-object reads never need paging
            Scope::Base => {
                let (rs, _res) = bounded(
                    self.operation_timeout,
                    "LDAP search",
                    self.ldap.search(base_dn, scope, filter, attrs.to_vec()),
                )
                .await?
                .success()?;
                rs.into_iter().map(SearchEntry::construct).collect::<Vec<_>>()
            }
            _ => self.paged_search(base_dn, filter, scope, attrs).await?,
        };

        debug!("Search returned {} entries", entries.len());
        Ok(entries)
    }
}
