use serde::{Serialize, Deserialize};

pub const USER_ID_HEADER: &str = "X-User-Id";

/// The caller a request acts on behalf of.
///
/// `user_id` is the identity recorded as poll owner and voter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserInfo {
    pub user_id: String,
    pub ip: String,
}

pub fn generate_server_fingerprint(ip: &str, user_agent: Option<&str>) -> String {
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;
    use sha2::{Sha256, Digest};

    let mut hasher = Sha256::new();
    hasher.update(ip.as_bytes());
    if let Some(ua) = user_agent {
        hasher.update(ua.as_bytes());
    }
    URL_SAFE_NO_PAD.encode(hasher.finalize())
}

/// Picks the explicit user id when one was supplied, falling back to the
/// fingerprint of the connection.
pub fn resolve_user_id(explicit: Option<&str>, ip: &str, user_agent: Option<&str>) -> String {
    match explicit.map(str::trim) {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => generate_server_fingerprint(ip, user_agent),
    }
}

#[cfg(feature = "backend")]
mod backend_impl {
    use super::*;
    use rocket::request::{FromRequest, Outcome};
    use rocket::Request;

    #[rocket::async_trait]
    impl<'r> FromRequest<'r> for UserInfo {
        type Error = ();

        async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
            let headers = req.headers();
            let ip = headers.get_one("X-Real-IP")
                .or_else(|| headers.get_one("X-Forwarded-For"))
                .map(str::to_string)
                .or_else(|| req.client_ip().map(|addr| addr.to_string()))
                .unwrap_or_else(|| "0.0.0.0".to_string());

            let user_id = resolve_user_id(
                headers.get_one(USER_ID_HEADER),
                &ip,
                headers.get_one("User-Agent"),
            );

            Outcome::Success(UserInfo { user_id, ip })
        }
    }
}
