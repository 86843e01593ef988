// Copyright (c) 2024-2025 Jesse Morgan
// Licensed under the MIT License. See LICENSE file for details.

//! Admin dashboard operations.
//!
//! Every authenticated call goes through the session so that a rejected token
//! logs the user out immediately, whatever the watchdog is doing.

use thiserror::Error;

use crate::api::{ApiClient, ApiError};
use crate::models::{Article, ArticleDraft, Declaration, GalleryCategory, GalleryImage, ValidationError};
use crate::security::SessionManager;
use crate::storage::TokenStore;

/// Session type the dashboard runs against.
pub type Session<S> = SessionManager<ApiClient, S>;

#[derive(Debug, Error)]
pub enum DashboardError {
    #[error("invalid input: {0}")]
    Invalid(#[from] ValidationError),

    #[error(transparent)]
    Api(#[from] ApiError),
}

// ----------------------------------------------------------------------
// Declarations
// ----------------------------------------------------------------------

pub async fn list_declarations<S: TokenStore>(session: &mut Session<S>) -> Result<Vec<Declaration>, ApiError> {
    let result = session.backend().list_declarations().await;
    let declarations = session.observe(result)?;
    tracing::debug!("DASHBOARD_DECLARATIONS | count={}", declarations.len());
    Ok(declarations)
}

/// Declarations whose name (case-insensitive) or id number contains `term`.
/// An empty term keeps everything.
pub fn filter_declarations<'a>(declarations: &'a [Declaration], term: &str) -> Vec<&'a Declaration> {
    declarations.iter().filter(|d| d.matches(term)).collect()
}

/// Public form submission. Validated locally before anything is sent.
pub async fn submit_declaration(client: &ApiClient, declaration: &Declaration) -> Result<(), DashboardError> {
    declaration.validate()?;
    client.submit_declaration(declaration).await?;
    tracing::info!("DECLARATION_SUBMITTED | name={}", declaration.name);
    Ok(())
}

// ----------------------------------------------------------------------
// Articles
// ----------------------------------------------------------------------

/// Published articles, or every article including drafts when `include_drafts`.
pub async fn list_articles<S: TokenStore>(
    session: &mut Session<S>,
    include_drafts: bool,
) -> Result<Vec<Article>, ApiError> {
    let result = if include_drafts {
        session.backend().list_all_articles().await
    } else {
        session.backend().list_published_articles().await
    };
    session.observe(result)
}

/// A single article, drafts included, as loaded by the editor.
pub async fn get_article<S: TokenStore>(session: &mut Session<S>, id: &str) -> Result<Article, ApiError> {
    let result = session.backend().get_article(id).await;
    session.observe(result)
}

/// Create the article when `id` is `None`, otherwise update it.
pub async fn save_article<S: TokenStore>(
    session: &mut Session<S>,
    id: Option<&str>,
    draft: &ArticleDraft,
) -> Result<Article, DashboardError> {
    draft.validate()?;
    let result = match id {
        Some(id) => session.backend().update_article(id, draft).await,
        None => session.backend().create_article(draft).await,
    };
    let article = session.observe(result)?;
    tracing::info!(
        "ARTICLE_SAVED | id={} published={} created={}",
        article.id,
        article.published,
        id.is_none()
    );
    Ok(article)
}

pub async fn delete_article<S: TokenStore>(session: &mut Session<S>, id: &str) -> Result<(), ApiError> {
    let result = session.backend().delete_article(id).await;
    session.observe(result)?;
    tracing::info!("ARTICLE_DELETED | id={}", id);
    Ok(())
}

// ----------------------------------------------------------------------
// Gallery
// ----------------------------------------------------------------------

/// Gallery images in display order.
pub async fn list_gallery<S: TokenStore>(session: &mut Session<S>) -> Result<Vec<GalleryImage>, ApiError> {
    let result = session.backend().list_gallery().await;
    let mut images = session.observe(result)?;
    images.sort_by_key(|image| image.order);
    Ok(images)
}

pub fn filter_gallery(images: &[GalleryImage], category: Option<GalleryCategory>) -> Vec<&GalleryImage> {
    images
        .iter()
        .filter(|image| category.map_or(true, |c| image.category == c))
        .collect()
}

/// Case-insensitive substring search over title, description and category.
/// An empty term keeps everything.
pub fn search_gallery<'a>(images: &'a [GalleryImage], term: &str) -> Vec<&'a GalleryImage> {
    let term = term.trim().to_lowercase();
    if term.is_empty() {
        return images.iter().collect();
    }
    images
        .iter()
        .filter(|image| {
            image.title.to_lowercase().contains(&term)
                || image.description.to_lowercase().contains(&term)
                || image.category.to_string().contains(&term)
        })
        .collect()
}

pub async fn delete_gallery_image<S: TokenStore>(session: &mut Session<S>, id: &str) -> Result<(), ApiError> {
    let result = session.backend().delete_gallery_image(id).await;
    session.observe(result)?;
    tracing::info!("GALLERY_IMAGE_DELETED | id={}", id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::HealthConditions;

    fn declaration(name: &str, id_number: &str) -> Declaration {
        Declaration {
            id: None,
            name: name.to_string(),
            id_number: id_number.to_string(),
            phone: "050-1234567".to_string(),
            health_conditions: HealthConditions::default(),
            confirm_truth: true,
            signature: "data:image/png;base64,AAAA".to_string(),
            created_at: None,
        }
    }

    fn image(id: &str, category: GalleryCategory, order: i32) -> GalleryImage {
        GalleryImage {
            id: id.to_string(),
            title: format!("image {}", id),
            description: String::new(),
            category,
            published: true,
            order,
            image: None,
        }
    }

    #[test]
    fn test_filter_declarations() {
        let list = vec![
            declaration("Dana Levi", "123456789"),
            declaration("Noa Cohen", "987654321"),
        ];

        assert_eq!(filter_declarations(&list, "").len(), 2);
        assert_eq!(filter_declarations(&list, "  ").len(), 2);

        let by_name = filter_declarations(&list, "dana");
        assert_eq!(by_name.len(), 1);
        assert_eq!(by_name[0].name, "Dana Levi");

        let by_id = filter_declarations(&list, "6543");
        assert_eq!(by_id.len(), 1);
        assert_eq!(by_id[0].name, "Noa Cohen");

        assert!(filter_declarations(&list, "nobody").is_empty());
    }

    #[test]
    fn test_filter_gallery() {
        let images = vec![
            image("a", GalleryCategory::Massage, 2),
            image("b", GalleryCategory::General, 1),
            image("c", GalleryCategory::Massage, 0),
        ];

        assert_eq!(filter_gallery(&images, None).len(), 3);

        let massage: Vec<&str> = filter_gallery(&images, Some(GalleryCategory::Massage))
            .iter()
            .map(|i| i.id.as_str())
            .collect();
        assert_eq!(massage, vec!["a", "c"]);

        assert!(filter_gallery(&images, Some(GalleryCategory::Testimonials)).is_empty());
    }

    #[test]
    fn test_search_gallery() {
        let mut room = image("a", GalleryCategory::TreatmentRoom, 0);
        room.title = "Quiet Room".to_string();
        let mut hands = image("b", GalleryCategory::Massage, 1);
        hands.description = "Deep TISSUE session".to_string();
        let feet = image("c", GalleryCategory::Reflexology, 2);
        let images = vec![room, hands, feet];

        assert_eq!(search_gallery(&images, "").len(), 3);
        assert_eq!(search_gallery(&images, "   ").len(), 3);

        let ids = |found: Vec<&GalleryImage>| found.iter().map(|i| i.id.clone()).collect::<Vec<_>>();
        assert_eq!(ids(search_gallery(&images, "quiet")), vec!["a"]);
        assert_eq!(ids(search_gallery(&images, "tissue")), vec!["b"]);
        assert_eq!(ids(search_gallery(&images, "REFLEX")), vec!["c"]);
        assert_eq!(ids(search_gallery(&images, "treatment_room")), vec!["a"]);
        assert!(search_gallery(&images, "kitchen").is_empty());
    }

    #[tokio::test]
    async fn test_submit_rejects_invalid_before_sending() {
        // Nothing listens here; validation must fail first.
        let client = ApiClient::new("http://127.0.0.1:9", 1).unwrap();
        let mut unsigned = declaration("Dana Levi", "123456789");
        unsigned.signature.clear();

        let err = submit_declaration(&client, &unsigned).await.unwrap_err();
        assert!(matches!(err, DashboardError::Invalid(ValidationError::MissingSignature)));
    }
}
