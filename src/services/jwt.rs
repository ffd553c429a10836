use jsonwebtoken::{encode, decode, Header, Validation, EncodingKey, DecodingKey};
use serde::{Deserialize, Serialize};
use mongodb::bson::oid::ObjectId;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // User ID
    pub email: String,
    pub role: String, // "user" | "admin"
    pub exp: i64,
    pub iat: i64,
}

/// Token validation for the request guards. Tokens are issued by the auth
/// service; this core only needs to verify them and read the claims.
pub struct JwtService;

impl JwtService {
    pub fn generate_token(
        user_id: &ObjectId,
        email: &str,
        role: &str,
    ) -> Result<String, jsonwebtoken::errors::Error> {
        let expiry = crate::config::Config::jwt_expiry();
        let now = chrono::Utc::now().timestamp();

        let claims = Claims {
            sub: user_id.to_hex(),
            email: email.to_string(),
            role: role.to_string(),
            exp: now + expiry,
            iat: now,
        };

        let secret = crate::config::Config::jwt_secret();
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
    }

    pub fn verify_token(token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        let secret = crate::config::Config::jwt_secret();

        let token_data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::default(),
        )?;

        Ok(token_data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_round_trip_preserves_claims() {
        let user_id = ObjectId::new();
        let token = JwtService::generate_token(&user_id, "a@b.com", "admin").unwrap();
        let claims = JwtService::verify_token(&token).unwrap();

        assert_eq!(claims.sub, user_id.to_hex());
        assert_eq!(claims.email, "a@b.com");
        assert_eq!(claims.role, "admin");
    }

    #[test]
    fn tampered_token_is_rejected() {
        let user_id = ObjectId::new();
        let token = JwtService::generate_token(&user_id, "a@b.com", "user").unwrap();
        let mut tampered = token.clone();
        tampered.push('x');
        assert!(JwtService::verify_token(&tampered).is_err());
    }
}
