//! Transport boundary, the ureq-backed transport, and the default-client provider.

use std::fmt;
use std::io::{self, Read};
use std::sync::{Arc, Mutex, OnceLock, RwLock};
use std::time::Duration;

use http::header::USER_AGENT;
use http::HeaderValue;
use ureq::SendBody;

use crate::error::Result;
use crate::http::{BuiltRequest, RawResponse, WireBody};

/// Something that can carry a built request to a server and hand back the
/// response head with an unread body.
pub trait Transport: Send + Sync {
    /// Send `request`, blocking until the response headers have arrived.
    fn execute(&self, request: BuiltRequest) -> Result<RawResponse>;

    /// Release pooled resources. The transport must not be used afterwards.
    fn close(&self) {}
}

/// Transport configuration.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// Overall timeout applied to every request without its own.
    pub request_timeout: Option<Duration>,
    /// User agent string, sent unless the request sets its own.
    pub user_agent: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: None,
            user_agent: format!("wirecall/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl TransportConfig {
    /// Defaults overlaid with `WIRECALL_CONNECT_TIMEOUT_MS`,
    /// `WIRECALL_REQUEST_TIMEOUT_MS` and `WIRECALL_USER_AGENT`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let millis = |key: &str| {
            lookup(key)
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_millis)
        };
        let mut config = Self::default();
        if let Some(d) = millis("WIRECALL_CONNECT_TIMEOUT_MS") {
            config.connect_timeout = d;
        }
        if let Some(d) = millis("WIRECALL_REQUEST_TIMEOUT_MS") {
            config.request_timeout = Some(d);
        }
        if let Some(ua) = lookup("WIRECALL_USER_AGENT") {
            config.user_agent = ua;
        }
        config
    }
}

/// Blocking HTTP/1.1 transport over a `ureq` agent.
pub struct UreqTransport {
    agent: ureq::Agent,
    config: TransportConfig,
}

impl UreqTransport {
    pub fn new(config: TransportConfig) -> Self {
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_connect(Some(config.connect_timeout))
            .timeout_global(config.request_timeout)
            .build()
            .new_agent();
        Self { agent, config }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new(TransportConfig::default())
    }
}

impl Transport for UreqTransport {
    fn execute(&self, built: BuiltRequest) -> Result<RawResponse> {
        let BuiltRequest { request, timeout } = built;
        let (mut parts, body) = request.into_parts();

        if parts.version == http::Version::HTTP_2 {
            tracing::warn!("HTTP/2 requested for {}; sending as HTTP/1.1", parts.uri);
            parts.version = http::Version::HTTP_11;
        }
        if !parts.headers.contains_key(USER_AGENT) {
            if let Ok(ua) = HeaderValue::try_from(self.config.user_agent.as_str()) {
                parts.headers.insert(USER_AGENT, ua);
            }
        }

        let send_body = match body {
            WireBody::Empty => SendBody::none(),
            WireBody::Bytes(bytes) => SendBody::from_owned_reader(std::io::Cursor::new(bytes)),
            WireBody::Reader { reader, .. } => {
                SendBody::from_owned_reader(SyncReader(Mutex::new(reader)))
            }
        };
        let request = http::Request::from_parts(parts, send_body);
        let request = match timeout {
            Some(timeout) => self
                .agent
                .configure_request(request)
                .timeout_global(Some(timeout))
                .build(),
            None => request,
        };

        let response = self.agent.run(request)?;
        let (parts, body) = response.into_parts();
        Ok(RawResponse {
            parts,
            body: Box::new(body.into_reader()),
        })
    }

    fn close(&self) {
        tracing::debug!("Closing ureq transport");
    }
}

/// Lets a `Send`-only body reader cross into ureq, which wants `Sync`.
struct SyncReader(Mutex<Box<dyn Read + Send>>);

impl Read for SyncReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.get_mut().unwrap_or_else(|e| e.into_inner()).read(buf)
    }
}

type Factory = Box<dyn Fn() -> Arc<dyn Transport> + Send + Sync>;

/// Owns the default transport: built on first use, replaced after `close`.
pub struct ClientProvider {
    factory: Factory,
    current: RwLock<Option<Arc<dyn Transport>>>,
}

impl ClientProvider {
    /// A provider whose transport is a `UreqTransport` built from `config`.
    pub fn new(config: TransportConfig) -> Self {
        Self::with_factory(move || -> Arc<dyn Transport> {
            Arc::new(UreqTransport::new(config.clone()))
        })
    }

    pub fn with_factory<F>(factory: F) -> Self
    where
        F: Fn() -> Arc<dyn Transport> + Send + Sync + 'static,
    {
        Self {
            factory: Box::new(factory),
            current: RwLock::new(None),
        }
    }

    /// The process-wide provider, configured from the environment.
    pub fn global() -> &'static Arc<ClientProvider> {
        static GLOBAL: OnceLock<Arc<ClientProvider>> = OnceLock::new();
        GLOBAL.get_or_init(|| Arc::new(ClientProvider::new(TransportConfig::from_env())))
    }

    /// The current transport, constructing it if there is none.
    pub fn get(&self) -> Arc<dyn Transport> {
        if let Some(transport) = self
            .current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
        {
            return Arc::clone(transport);
        }
        let mut slot = self.current.write().unwrap_or_else(|e| e.into_inner());
        match slot.as_ref() {
            Some(transport) => Arc::clone(transport),
            None => {
                tracing::debug!("Constructing default transport");
                let transport = (self.factory)();
                *slot = Some(Arc::clone(&transport));
                transport
            }
        }
    }

    /// Whether a transport is currently constructed.
    pub fn is_initialized(&self) -> bool {
        self.current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }

    /// Drop the current transport and close it. Requests already holding it
    /// finish on it; the next `get` builds a new one.
    pub fn close(&self) {
        let old = self.current.write().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(transport) = old {
            tracing::debug!("Closing default transport");
            transport.close();
        }
    }
}

impl Default for ClientProvider {
    fn default() -> Self {
        Self::new(TransportConfig::default())
    }
}

impl fmt::Debug for ClientProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientProvider")
            .field("initialized", &self.is_initialized())
            .finish()
    }
}
