// Copyright (c) 2024-2025 Jesse Morgan
// Licensed under the MIT License. See LICENSE file for details.

//! Records exchanged with the practice backend.
//!
//! Field names follow the backend's JSON (camelCase, `_id` for ids).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Profile returned by the identity check (`GET /api/auth`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

impl User {
    /// Name for display, falling back to email and then the id.
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .or(self.email.as_deref())
            .unwrap_or(&self.id)
    }
}

/// Login form body.
#[derive(Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Health checklist on the declaration form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthConditions {
    #[serde(default)]
    pub heart_problems: bool,
    #[serde(default)]
    pub high_blood_pressure: bool,
    #[serde(default)]
    pub diabetes: bool,
    #[serde(default)]
    pub pregnancy: bool,
    #[serde(default)]
    pub recent_surgery: bool,
    #[serde(default)]
    pub skin_conditions: bool,
    #[serde(default)]
    pub allergies: bool,
    #[serde(default)]
    pub other: String,
}

impl HealthConditions {
    /// Labels of every condition that is ticked, plus the free-text entry.
    pub fn reported(&self) -> Vec<String> {
        let flags = [
            (self.heart_problems, "heart problems"),
            (self.high_blood_pressure, "high blood pressure"),
            (self.diabetes, "diabetes"),
            (self.pregnancy, "pregnancy"),
            (self.recent_surgery, "recent surgery"),
            (self.skin_conditions, "skin conditions"),
            (self.allergies, "allergies"),
        ];
        let mut out: Vec<String> = flags
            .iter()
            .filter(|(set, _)| *set)
            .map(|(_, label)| label.to_string())
            .collect();
        let other = self.other.trim();
        if !other.is_empty() {
            out.push(other.to_string());
        }
        out
    }
}

/// A signed health declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Declaration {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub id_number: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub health_conditions: HealthConditions,
    #[serde(default)]
    pub confirm_truth: bool,
    /// Signature image as a data URL
    #[serde(default)]
    pub signature: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("the declaration must be confirmed as truthful")]
    NotConfirmed,

    #[error("a signature is required")]
    MissingSignature,
}

impl Declaration {
    /// Check the form before it is sent to the backend.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let required = [
            (&self.name, "name"),
            (&self.id_number, "id number"),
            (&self.phone, "phone"),
        ];
        for (value, field) in required {
            if value.trim().is_empty() {
                return Err(ValidationError::MissingField(field));
            }
        }
        if !self.confirm_truth {
            return Err(ValidationError::NotConfirmed);
        }
        if self.signature.trim().is_empty() {
            return Err(ValidationError::MissingSignature);
        }
        Ok(())
    }

    /// Case-insensitive match on the name, plain substring on the id number.
    pub fn matches(&self, term: &str) -> bool {
        let term = term.trim();
        if term.is_empty() {
            return true;
        }
        self.name.to_lowercase().contains(&term.to_lowercase()) || self.id_number.contains(term)
    }
}

/// An article as listed on the site and in the dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub published: bool,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Body for creating or updating an article.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleDraft {
    pub title: String,
    pub summary: String,
    pub content: String,
    pub published: bool,
}

impl ArticleDraft {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.title.trim().is_empty() {
            return Err(ValidationError::MissingField("title"));
        }
        if self.content.trim().is_empty() {
            return Err(ValidationError::MissingField("content"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GalleryCategory {
    #[default]
    General,
    TreatmentRoom,
    Massage,
    Reflexology,
    Testimonials,
}

impl std::str::FromStr for GalleryCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "general" => Ok(Self::General),
            "treatment_room" | "treatment-room" => Ok(Self::TreatmentRoom),
            "massage" => Ok(Self::Massage),
            "reflexology" => Ok(Self::Reflexology),
            "testimonials" => Ok(Self::Testimonials),
            other => Err(format!("unknown gallery category: {}", other)),
        }
    }
}

impl std::fmt::Display for GalleryCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::General => "general",
            Self::TreatmentRoom => "treatment_room",
            Self::Massage => "massage",
            Self::Reflexology => "reflexology",
            Self::Testimonials => "testimonials",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GalleryImage {
    #[serde(rename = "_id")]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: GalleryCategory,
    #[serde(default)]
    pub published: bool,
    #[serde(default)]
    pub order: i32,
    /// Upload path as served by the backend (`/uploads/...`)
    #[serde(default)]
    pub image: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn declaration(name: &str, id_number: &str) -> Declaration {
        Declaration {
            id: None,
            name: name.to_string(),
            id_number: id_number.to_string(),
            phone: "050-0000000".to_string(),
            health_conditions: HealthConditions::default(),
            confirm_truth: true,
            signature: "data:image/png;base64,AAAA".to_string(),
            created_at: None,
        }
    }

    #[test]
    fn test_user_parses_backend_shape() {
        let user: User =
            serde_json::from_str(r#"{"_id":"u1","name":"Leah","email":"l@example.com"}"#).unwrap();
        assert_eq!(user.id, "u1");
        assert_eq!(user.display_name(), "Leah");
        assert_eq!(user.role, None);
    }

    #[test]
    fn test_credentials_debug_hides_password() {
        let creds = Credentials::new("a@b.c", "hunter2");
        let debug = format!("{:?}", creds);
        assert!(debug.contains("a@b.c"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_declaration_validation() {
        assert!(declaration("Dana", "123").validate().is_ok());

        let mut d = declaration("  ", "123");
        assert_eq!(d.validate(), Err(ValidationError::MissingField("name")));

        d = declaration("Dana", "123");
        d.confirm_truth = false;
        assert_eq!(d.validate(), Err(ValidationError::NotConfirmed));

        d = declaration("Dana", "123");
        d.signature.clear();
        assert_eq!(d.validate(), Err(ValidationError::MissingSignature));
    }

    #[test]
    fn test_declaration_matches() {
        let d = declaration("Dana Levi", "034567891");
        assert!(d.matches(""));
        assert!(d.matches("levi"));
        assert!(d.matches("DANA"));
        assert!(d.matches("4567"));
        assert!(!d.matches("cohen"));
    }

    #[test]
    fn test_declaration_camel_case_json() {
        let json = serde_json::to_value(declaration("Dana", "1")).unwrap();
        assert!(json.get("idNumber").is_some());
        assert!(json.get("confirmTruth").is_some());
        assert!(json["healthConditions"].get("highBloodPressure").is_some());
        assert!(json.get("_id").is_none());
    }

    #[test]
    fn test_reported_conditions() {
        let conditions = HealthConditions {
            diabetes: true,
            allergies: true,
            other: " back pain ".to_string(),
            ..Default::default()
        };
        assert_eq!(conditions.reported(), vec!["diabetes", "allergies", "back pain"]);
    }

    #[test]
    fn test_gallery_category_round_trip() {
        let cat: GalleryCategory = "treatment_room".parse().unwrap();
        assert_eq!(cat, GalleryCategory::TreatmentRoom);
        assert_eq!(cat.to_string(), "treatment_room");
        assert!("kitchen".parse::<GalleryCategory>().is_err());
        let img: GalleryImage =
            serde_json::from_str(r#"{"_id":"g1","title":"Room","category":"massage"}"#).unwrap();
        assert_eq!(img.category, GalleryCategory::Massage);
    }

    #[test]
    fn test_gallery_image_keeps_backend_upload_path() {
        let img: GalleryImage = serde_json::from_str(
            r#"{"_id":"g1","title":"Room","description":"Quiet corner","category":"massage","order":3,"published":true,"image":"/uploads/room.jpg"}"#,
        )
        .unwrap();
        assert_eq!(img.image.as_deref(), Some("/uploads/room.jpg"));
        assert_eq!(img.order, 3);

        let json = serde_json::to_value(&img).unwrap();
        assert_eq!(json["image"], "/uploads/room.jpg");
        assert!(json.get("imageUrl").is_none());
    }

    #[test]
    fn test_article_draft_validation() {
        let draft = ArticleDraft {
            title: "Reflexology basics".into(),
            summary: String::new(),
            content: String::new(),
            published: false,
        };
        assert_eq!(draft.validate(), Err(ValidationError::MissingField("content")));
    }
}
