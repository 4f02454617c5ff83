use axum::{extract::FromRequestParts, http::request::Parts};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use cinebox_order::Requester;
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::state::AppState;

pub const ROLE_MEMBER: &str = "MEMBER";
pub const ROLE_STAFF: &str = "STAFF";

/// Bearer token claims. Tokens are issued elsewhere; this service only verifies them.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MemberClaims {
    /// Member id
    pub sub: String,
    pub role: String,
    pub exp: usize,
}

impl MemberClaims {
    pub fn member_id(&self) -> Result<i64, AppError> {
        self.sub
            .parse()
            .map_err(|_| AppError::Unauthorized(format!("Invalid subject '{}'", self.sub)))
    }

    pub fn requester(&self) -> Result<Requester, AppError> {
        let member_id = self.member_id()?;
        Ok(if self.role == ROLE_STAFF {
            Requester::staff(member_id)
        } else {
            Requester::member(member_id)
        })
    }
}

pub fn decode_claims(token: &str, secret: &str) -> Result<MemberClaims, AppError> {
    let token_data = decode::<MemberClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| AppError::Unauthorized(e.to_string()))?;

    let claims = token_data.claims;
    if claims.role != ROLE_MEMBER && claims.role != ROLE_STAFF {
        return Err(AppError::Unauthorized(format!("Role '{}' may not reserve", claims.role)));
    }
    Ok(claims)
}

impl FromRequestParts<AppState> for MemberClaims {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| AppError::Unauthorized("Missing bearer token".to_string()))?;

        decode_claims(bearer.token(), state.auth.jwt_secret.expose())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn token(sub: &str, role: &str, secret: &str) -> String {
        let claims = MemberClaims {
            sub: sub.to_string(),
            role: role.to_string(),
            exp: (chrono::Utc::now() + chrono::Duration::hours(1)).timestamp() as usize,
        };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
    }

    #[test]
    fn test_member_and_staff_tokens() {
        let claims = decode_claims(&token("7", ROLE_MEMBER, "s3cret"), "s3cret").unwrap();
        assert_eq!(claims.requester().unwrap(), Requester::member(7));

        let claims = decode_claims(&token("8", ROLE_STAFF, "s3cret"), "s3cret").unwrap();
        assert_eq!(claims.requester().unwrap(), Requester::staff(8));
    }

    #[test]
    fn test_rejected_tokens() {
        assert!(decode_claims(&token("7", ROLE_MEMBER, "other"), "s3cret").is_err());
        assert!(decode_claims(&token("7", "GUEST", "s3cret"), "s3cret").is_err());

        let claims = decode_claims(&token("abc", ROLE_MEMBER, "s3cret"), "s3cret").unwrap();
        assert!(claims.member_id().is_err());
    }
}
