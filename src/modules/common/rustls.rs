use crate::{
    modules::{
        context::Initialize,
        error::{code::ErrorCode, BridgeResult},
    },
    raise_error,
};

/// Installs the process-wide rustls crypto provider used by the IMAP client
/// and by `reqwest`/`mail-send` through their rustls backends.
pub struct BridgeTls;

impl Initialize for BridgeTls {
    async fn initialize() -> BridgeResult<()> {
        rustls::crypto::CryptoProvider::install_default(rustls::crypto::ring::default_provider())
            .map_err(|_| {
                raise_error!(
                    "failed to set crypto provider".into(),
                    ErrorCode::InternalError
                )
            })
    }
}
