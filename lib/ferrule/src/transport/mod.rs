//! Transports shipped with ferrule.
//!
//! The [`Transport`] seam itself lives in `ferrule-core`. This module
//! provides the hyper-based network transport (feature `hyper-transport`,
//! on by default) and [`ServiceTransport`] for tower services.

#[cfg(feature = "hyper-transport")]
mod connector;
#[cfg(feature = "hyper-transport")]
mod hyper;
mod service;

use std::sync::Arc;

use ferrule_core::{Result, Transport};

#[cfg(feature = "hyper-transport")]
pub use self::connector::https_connector;
#[cfg(feature = "hyper-transport")]
pub use self::hyper::{HyperTransport, HyperTransportBuilder, ServiceFuture};
pub use self::service::ServiceTransport;

/// Transport used when neither the call nor the client names one.
///
/// # Errors
///
/// Returns [`ferrule_core::Error::NoAdapterAvailable`] when no network
/// transport is compiled in.
#[cfg(feature = "hyper-transport")]
pub fn default_transport() -> Result<Arc<dyn Transport>> {
    use std::sync::OnceLock;

    static SHARED: OnceLock<Arc<dyn Transport>> = OnceLock::new();
    Ok(Arc::clone(
        SHARED.get_or_init(|| Arc::new(HyperTransport::new())),
    ))
}

/// Transport used when neither the call nor the client names one.
///
/// # Errors
///
/// Returns [`ferrule_core::Error::NoAdapterAvailable`] when no network
/// transport is compiled in.
#[cfg(not(feature = "hyper-transport"))]
pub fn default_transport() -> Result<Arc<dyn Transport>> {
    Err(ferrule_core::Error::NoAdapterAvailable)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(feature = "hyper-transport")]
    #[test]
    fn default_transport_is_hyper() {
        let transport = default_transport().expect("hyper transport");
        assert_eq!(transport.name(), "hyper");
    }

    #[cfg(not(feature = "hyper-transport"))]
    #[test]
    fn default_transport_requires_a_feature() {
        assert!(matches!(
            default_transport(),
            Err(ferrule_core::Error::NoAdapterAvailable)
        ));
    }
}
