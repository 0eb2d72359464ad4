use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct TokenClaims {
    exp: i64,
}

/// Read the `exp` claim of a JWT access token and format it for humans,
/// e.g. "December 16, 2025 at 14:30 UTC (in 7 days)".
pub fn format_token_expiration(token: &str) -> Result<String> {
    // Only the expiry is read; the issuer already validated the token
    let mut validation = Validation::new(Algorithm::RS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;

    let token_data = decode::<TokenClaims>(token, &DecodingKey::from_secret(&[]), &validation)
        .context("Failed to decode token to read expiration")?;

    let expires_at = DateTime::<Utc>::from_timestamp(token_data.claims.exp, 0)
        .ok_or_else(|| anyhow::anyhow!("Invalid expiration timestamp"))?;

    Ok(format!(
        "{} ({})",
        expires_at.format("%B %d, %Y at %H:%M UTC"),
        relative_to_now(expires_at, Utc::now())
    ))
}

fn relative_to_now(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let remaining = expires_at.signed_duration_since(now);

    let (amount, unit) = if remaining.num_days() > 0 {
        (remaining.num_days(), "day")
    } else if remaining.num_hours() > 0 {
        (remaining.num_hours(), "hour")
    } else if remaining.num_minutes() > 0 {
        (remaining.num_minutes(), "minute")
    } else {
        return "expires soon".to_string();
    };

    if amount == 1 {
        format!("in 1 {}", unit)
    } else {
        format!("in {} {}s", amount, unit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde::Serialize;

    #[derive(Serialize)]
    struct Claims {
        exp: i64,
        sub: String,
    }

    #[test]
    fn test_relative_durations() {
        let now = Utc::now();
        assert_eq!(relative_to_now(now + Duration::days(7) + Duration::minutes(1), now), "in 7 days");
        assert_eq!(relative_to_now(now + Duration::minutes(61), now), "in 1 hour");
        assert_eq!(relative_to_now(now + Duration::minutes(5) + Duration::seconds(5), now), "in 5 minutes");
        assert_eq!(relative_to_now(now - Duration::minutes(5), now), "expires soon");
    }

    #[test]
    fn test_format_token_expiration() {
        let claims = Claims {
            exp: 1_765_895_400, // 2025-12-16 14:30 UTC
            sub: "alice".to_string(),
        };
        let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(b"k")).unwrap();

        let formatted = format_token_expiration(&token).unwrap();
        assert!(
            formatted.starts_with("December 16, 2025 at 14:30 UTC"),
            "got {formatted}"
        );
    }

    #[test]
    fn test_opaque_token_is_an_error() {
        assert!(format_token_expiration("not-a-jwt").is_err());
    }
}
