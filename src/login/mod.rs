pub mod device_flow;
pub mod manager;
pub mod token_utils;

pub use device_flow::{
    DeviceAuthorization, DeviceCodeResponse, OidcClient, OidcEndpoints, TokenResponse,
};
pub use manager::{AuthManager, SERVICE_ACCOUNT_SECRET_VAR};
