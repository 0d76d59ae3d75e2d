//! Account and PDF settings routes
//!
//! These routes write the descriptive profile columns and `pdf_settings`.
//! `credits` is owned by the credit ledger and never written here.

use axum::{
    extract::{Extension, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use offertedesk_shared::begin_user_scope;

use crate::{auth::AuthUser, error::ApiError, state::AppState};

/// Keys of `pdf_settings` managed through the account form
const ADDRESS_KEYS: [&str; 4] = ["address", "postcode", "city", "email"];

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountResponse {
    pub company_name: String,
    pub phone: String,
    pub kvk: String,
    pub btw: String,
    pub address: String,
    pub postcode: String,
    pub city: String,
    pub email: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateAccountRequest {
    pub company_name: String,
    pub phone: String,
    pub kvk: String,
    pub btw: String,
    pub address: String,
    pub postcode: String,
    pub city: String,
    pub email: String,
}

impl UpdateAccountRequest {
    /// The `pdf_settings` keys this form owns
    pub fn address_patch(&self) -> Value {
        let values = [&self.address, &self.postcode, &self.city, &self.email];
        let patch: Map<String, Value> = ADDRESS_KEYS
            .iter()
            .zip(values)
            .map(|(key, value)| (key.to_string(), Value::String(value.trim().to_string())))
            .collect();
        Value::Object(patch)
    }
}

#[derive(sqlx::FromRow)]
struct AccountRow {
    company_name: Option<String>,
    phone_number: Option<String>,
    kvk_number: Option<String>,
    vat_number: Option<String>,
    pdf_settings: Value,
}

fn settings_str(settings: &Value, key: &str) -> Option<String> {
    settings
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Merge `patch` into `settings`, keeping keys the patch does not mention
pub fn merge_settings(settings: Value, patch: &Value) -> Value {
    let mut merged = match settings {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    if let Value::Object(patch) = patch {
        for (key, value) in patch {
            merged.insert(key.clone(), value.clone());
        }
    }
    Value::Object(merged)
}

/// Split the phone number out of a PDF settings object
///
/// Returns the remaining settings and the phone number reduced to digits.
pub fn split_phone_number(settings: Value) -> Result<(Value, String), ApiError> {
    let Value::Object(mut map) = settings else {
        return Err(ApiError::Validation(
            "PDF settings must be a JSON object".to_string(),
        ));
    };

    let raw_phone = match map.remove("phone_number") {
        Some(Value::String(s)) => s,
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    };
    let digits = raw_phone.chars().filter(char::is_ascii_digit).collect();

    Ok((Value::Object(map), digits))
}

/// Company details for the account page
pub async fn get_account(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> Result<Json<AccountResponse>, ApiError> {
    let mut tx = begin_user_scope(&state.pool, auth_user.user_id).await?;
    let row = sqlx::query_as::<_, AccountRow>(
        r#"
        SELECT company_name, phone_number, kvk_number, vat_number, pdf_settings
        FROM profiles
        WHERE id = $1
        "#,
    )
    .bind(auth_user.user_id.0)
    .fetch_optional(&mut *tx)
    .await?;
    tx.commit().await?;

    let auth_email = auth_user.email.clone().unwrap_or_default();
    let Some(row) = row else {
        return Ok(Json(AccountResponse {
            email: auth_email,
            ..Default::default()
        }));
    };

    Ok(Json(AccountResponse {
        company_name: row.company_name.unwrap_or_default(),
        phone: row.phone_number.unwrap_or_default(),
        kvk: row.kvk_number.unwrap_or_default(),
        btw: row.vat_number.unwrap_or_default(),
        address: settings_str(&row.pdf_settings, "address").unwrap_or_default(),
        postcode: settings_str(&row.pdf_settings, "postcode").unwrap_or_default(),
        city: settings_str(&row.pdf_settings, "city").unwrap_or_default(),
        email: settings_str(&row.pdf_settings, "email").unwrap_or(auth_email),
    }))
}

/// Update company details; address fields are merged into `pdf_settings`
pub async fn update_account(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(req): Json<UpdateAccountRequest>,
) -> Result<Json<Value>, ApiError> {
    let mut tx = begin_user_scope(&state.pool, auth_user.user_id).await?;
    // The merge happens in the UPDATE itself so a concurrent settings save is not lost
    sqlx::query(
        r#"
        INSERT INTO profiles (id, company_name, phone_number, kvk_number, vat_number, pdf_settings)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (id) DO UPDATE SET
            company_name = EXCLUDED.company_name,
            phone_number = EXCLUDED.phone_number,
            kvk_number = EXCLUDED.kvk_number,
            vat_number = EXCLUDED.vat_number,
            pdf_settings = CASE
                WHEN jsonb_typeof(profiles.pdf_settings) = 'object' THEN profiles.pdf_settings
                ELSE '{}'::jsonb
            END || EXCLUDED.pdf_settings,
            updated_at = NOW()
        "#,
    )
    .bind(auth_user.user_id.0)
    .bind(req.company_name.trim())
    .bind(req.phone.trim())
    .bind(req.kvk.trim())
    .bind(req.btw.trim())
    .bind(req.address_patch())
    .execute(&mut *tx)
    .await?;
    tx.commit().await?;

    tracing::info!(user_id = %auth_user.user_id, "Account details updated");

    Ok(Json(json!({ "success": true })))
}

/// PDF template settings, with the phone number merged back in
pub async fn get_pdf_settings(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> Result<Json<Value>, ApiError> {
    let mut tx = begin_user_scope(&state.pool, auth_user.user_id).await?;
    let row: Option<(Value, Option<String>)> =
        sqlx::query_as("SELECT pdf_settings, phone_number FROM profiles WHERE id = $1")
            .bind(auth_user.user_id.0)
            .fetch_optional(&mut *tx)
            .await?;
    tx.commit().await?;

    let (settings, phone) = row.unwrap_or((json!({}), None));
    let merged = merge_settings(settings, &json!({ "phone_number": phone }));
    Ok(Json(merged))
}

/// Replace the PDF template settings; the phone number goes to its own column
pub async fn update_pdf_settings(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(settings): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let (settings, phone) = split_phone_number(settings)?;

    let mut tx = begin_user_scope(&state.pool, auth_user.user_id).await?;
    sqlx::query(
        r#"
        INSERT INTO profiles (id, pdf_settings, phone_number)
        VALUES ($1, $2, $3)
        ON CONFLICT (id) DO UPDATE SET
            pdf_settings = EXCLUDED.pdf_settings,
            phone_number = EXCLUDED.phone_number,
            updated_at = NOW()
        "#,
    )
    .bind(auth_user.user_id.0)
    .bind(&settings)
    .bind(&phone)
    .execute(&mut *tx)
    .await?;
    tx.commit().await?;

    tracing::info!(user_id = %auth_user.user_id, "PDF settings updated");

    Ok(Json(json!({ "success": true })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_patch_only_touches_address_keys() {
        let req = UpdateAccountRequest {
            company_name: "Bouwbedrijf Jansen".to_string(),
            address: " Dorpsstraat 1 ".to_string(),
            postcode: "1234 AB".to_string(),
            city: "Utrecht".to_string(),
            email: "info@jansen.nl".to_string(),
            ..Default::default()
        };
        let patch = req.address_patch();
        let keys: Vec<&String> = patch.as_object().unwrap().keys().collect();
        assert_eq!(keys.len(), ADDRESS_KEYS.len());
        assert!(ADDRESS_KEYS.iter().all(|k| patch.get(*k).is_some()));
        assert_eq!(patch["address"], "Dorpsstraat 1");

        let existing = json!({ "primary_color": "#f97316", "city": "Amersfoort" });
        let merged = merge_settings(existing, &patch);
        assert_eq!(merged["primary_color"], "#f97316");
        assert_eq!(merged["city"], "Utrecht");
    }

    #[test]
    fn test_merge_into_non_object_settings() {
        let merged = merge_settings(json!("legacy"), &json!({ "city": "Zwolle" }));
        assert_eq!(merged, json!({ "city": "Zwolle" }));
    }

    #[test]
    fn test_split_phone_number() {
        let (rest, phone) = split_phone_number(json!({
            "phone_number": "+31 (0)6-12 34 56 78",
            "footer_text": "Betaling binnen 14 dagen"
        }))
        .unwrap();
        assert_eq!(phone, "310612345678");
        assert!(rest.get("phone_number").is_none());
        assert_eq!(rest["footer_text"], "Betaling binnen 14 dagen");

        let (_, phone) = split_phone_number(json!({})).unwrap();
        assert_eq!(phone, "");

        assert!(matches!(
            split_phone_number(json!(["not", "an", "object"])),
            Err(ApiError::Validation(_))
        ));
    }
}
