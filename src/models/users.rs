use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Rôles possibles (ensemble fermé)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    #[sea_orm(string_value = "user")]
    User,
    #[sea_orm(string_value = "guide")]
    Guide,
    #[sea_orm(string_value = "lead-guide")]
    LeadGuide,
    #[sea_orm(string_value = "admin")]
    Admin,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub name: String,
    #[sea_orm(unique)]
    pub email: String, // toujours en minuscules
    pub photo: String,
    pub role: Role,
    #[serde(skip_serializing)]
    pub password: String, // Format: pbkdf2:sha256:iterations$salt$hash
    #[serde(skip_serializing)]
    pub password_changed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing)]
    pub password_reset_token: Option<String>, // empreinte SHA-256, jamais le token brut
    #[serde(skip_serializing)]
    pub password_reset_expires: Option<DateTime<Utc>>,
    #[serde(skip_serializing)]
    pub active: bool, // false = supprimé (soft delete)
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::reviews::Entity")]
    Review,

    #[sea_orm(has_many = "super::tour_guides::Entity")]
    TourGuide,
}

impl Related<super::reviews::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Review.def()
    }
}

impl Related<super::tour_guides::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TourGuide.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// true si le mot de passe a changé après l'émission du token.
    /// Les deux instants sont ramenés à la milliseconde : un token émis
    /// après l'écriture du changement a toujours iat_ms >= changed_ms.
    pub fn changed_password_after(&self, token_issued_at_ms: i64) -> bool {
        match self.password_changed_at {
            Some(changed_at) => changed_at.timestamp_millis() > token_issued_at_ms,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn user(changed_at: Option<DateTime<Utc>>) -> Model {
        Model {
            id: 1,
            name: "Jonas".to_string(),
            email: "jonas@example.com".to_string(),
            photo: "default.jpg".to_string(),
            role: Role::User,
            password: String::new(),
            password_changed_at: changed_at,
            password_reset_token: None,
            password_reset_expires: None,
            active: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_never_changed_password() {
        assert!(!user(None).changed_password_after(0));
    }

    #[test]
    fn test_changed_password_after_token() {
        let changed = Utc::now();
        let before = (changed - Duration::seconds(5)).timestamp_millis();
        let after = (changed + Duration::milliseconds(1)).timestamp_millis();

        assert!(user(Some(changed)).changed_password_after(before));
        assert!(!user(Some(changed)).changed_password_after(after));
        // même milliseconde : le token est accepté
        assert!(!user(Some(changed)).changed_password_after(changed.timestamp_millis()));
    }

    #[test]
    fn test_secrets_are_not_serialized() {
        let mut u = user(Some(Utc::now()));
        u.password = "pbkdf2:sha256:1$a$b".to_string();
        u.password_reset_token = Some("deadbeef".to_string());

        let json = serde_json::to_value(&u).unwrap();
        assert!(json.get("password").is_none());
        assert!(json.get("password_reset_token").is_none());
        assert!(json.get("active").is_none());
        assert_eq!(json["role"], "user");
    }
}
