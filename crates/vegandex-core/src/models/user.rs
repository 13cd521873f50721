use serde::{Deserialize, Deserializer, Serialize};

/// The signed-in user's profile.
///
/// Serialized as `{_id, email, username, uploadedProducts}`, which is both the
/// `GET /auth/profile` shape and the persisted `user` snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(rename = "_id")]
    pub id: String,
    pub email: String,
    pub username: String,
    #[serde(default, deserialize_with = "deserialize_product_ids")]
    pub uploaded_products: Vec<String>,
}

impl UserProfile {
    /// Return a copy of this profile with `product_id` appended.
    pub fn with_uploaded_product(&self, product_id: &str) -> Self {
        let mut profile = self.clone();
        profile.uploaded_products.push(product_id.to_string());
        profile
    }
}

/// A product reference in `uploadedProducts`: either a bare id or a populated
/// product document.
#[derive(Deserialize)]
#[serde(untagged)]
enum ProductRef {
    Id(String),
    Document {
        #[serde(rename = "_id")]
        id: String,
    },
}

fn deserialize_product_ids<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let refs: Option<Vec<ProductRef>> = Option::deserialize(deserializer)?;
    Ok(refs
        .unwrap_or_default()
        .into_iter()
        .map(|r| match r {
            ProductRef::Id(id) => id,
            ProductRef::Document { id } => id,
        })
        .collect())
}

/// Response body of `POST /auth/login` and `POST /auth/register`.
///
/// Only the token matters; the canonical profile is always re-fetched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthResponse {
    #[serde(default)]
    pub token: Option<String>,
}

impl AuthResponse {
    /// The bearer token, if the server sent a non-empty one.
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref().filter(|t| !t.trim().is_empty())
    }
}

/// Body of `PUT /auth/profile`. Unset fields are left untouched server-side.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.username.is_none() && self.email.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_defaults_missing_uploaded_products() {
        let json = r#"{"_id":"1","email":"a@b.com","username":"alice"}"#;
        let profile: UserProfile = serde_json::from_str(json).unwrap();
        assert_eq!(profile.id, "1");
        assert!(profile.uploaded_products.is_empty());
    }

    #[test]
    fn test_profile_null_uploaded_products() {
        let json = r#"{"_id":"1","email":"a@b.com","username":"alice","uploadedProducts":null}"#;
        let profile: UserProfile = serde_json::from_str(json).unwrap();
        assert!(profile.uploaded_products.is_empty());
    }

    #[test]
    fn test_profile_accepts_populated_products() {
        let json = r#"{"_id":"1","email":"a@b.com","username":"alice",
            "uploadedProducts":["p1",{"_id":"p2","name":"Oat Milk"}],"__v":0}"#;
        let profile: UserProfile = serde_json::from_str(json).unwrap();
        assert_eq!(profile.uploaded_products, vec!["p1", "p2"]);
    }

    #[test]
    fn test_profile_serializes_persisted_shape() {
        let profile = UserProfile {
            id: "1".to_string(),
            email: "a@b.com".to_string(),
            username: "alice".to_string(),
            uploaded_products: vec!["p1".to_string()],
        };
        let value = serde_json::to_value(&profile).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "_id": "1",
                "email": "a@b.com",
                "username": "alice",
                "uploadedProducts": ["p1"]
            })
        );
    }

    #[test]
    fn test_with_uploaded_product_leaves_original_untouched() {
        let profile = UserProfile {
            id: "1".to_string(),
            email: "a@b.com".to_string(),
            username: "alice".to_string(),
            uploaded_products: vec!["p0".to_string()],
        };
        let updated = profile.with_uploaded_product("p1");
        assert_eq!(profile.uploaded_products, vec!["p0"]);
        assert_eq!(updated.uploaded_products, vec!["p0", "p1"]);
    }

    #[test]
    fn test_auth_response_token() {
        let resp: AuthResponse =
            serde_json::from_str(r#"{"token":"t1","_id":"1","email":"a@b.com"}"#).unwrap();
        assert_eq!(resp.token(), Some("t1"));

        let missing: AuthResponse = serde_json::from_str(r#"{"_id":"1"}"#).unwrap();
        assert_eq!(missing.token(), None);

        let blank: AuthResponse = serde_json::from_str(r#"{"token":"  "}"#).unwrap();
        assert_eq!(blank.token(), None);
    }

    #[test]
    fn test_profile_update_skips_unset_fields() {
        let update = ProfileUpdate {
            username: Some("bob".to_string()),
            email: None,
        };
        assert_eq!(
            serde_json::to_string(&update).unwrap(),
            r#"{"username":"bob"}"#
        );
        assert!(ProfileUpdate::default().is_empty());
    }
}
