//! REST client for the hosted record store.

use async_trait::async_trait;
use reqwest::{multipart, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;

use crate::audit::AuditTrail;
use crate::hashing::ContentFingerprint;
use crate::media::MediaKind;

use super::models::{NewTag, Tag, TagStatus};
use super::store::{RecordError, RecordStore};

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    errors: Vec<String>,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct TagData {
    tag: Tag,
}

#[derive(Debug, Deserialize)]
struct TrailTag {
    #[serde(default)]
    audit_trail: Option<AuditTrail>,
}

#[derive(Debug, Deserialize)]
struct TrailData {
    tag: TrailTag,
}

#[derive(Debug, Deserialize)]
struct LikeData {
    like_count: u64,
}

/// Client for the `/api/tags` surface.
pub struct RestRecordStore {
    base_url: String,
    client: reqwest::Client,
}

impl RestRecordStore {
    /// `base_url` points at the tags collection, e.g. `https://host/api/tags`.
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    fn create_url(&self, kind: MediaKind) -> String {
        let route = match kind {
            MediaKind::Image => "with-images",
            MediaKind::Video => "with-videos",
            MediaKind::Audio => "with-audio",
        };
        format!("{}/{}", self.base_url, route)
    }

    fn tag_url(&self, id: &str) -> String {
        format!("{}/{}", self.base_url, id)
    }

    fn create_form(tag: &NewTag) -> Result<multipart::Form, RecordError> {
        let mut form = multipart::Form::new()
            .text("file_name", tag.file_name.clone())
            .text("description", tag.description.clone())
            .text("hash_address", tag.fingerprint.to_string())
            .text("mediacid", tag.media_cid.clone())
            .text("metadatacid", tag.metadata_cid.clone())
            .text("address", tag.owner.clone())
            .text("type", tag.media_kind.as_str());

        for (field, urls) in [
            ("img_urls", &tag.urls.img_urls),
            ("video_urls", &tag.urls.video_urls),
            ("audio_urls", &tag.urls.audio_urls),
        ] {
            for url in urls {
                form = form.text(field, url.clone());
            }
        }
        if let Some(size) = tag.file_size {
            form = form.text("file_size", size.to_string());
        }
        if let Some(trail) = &tag.audit_trail {
            let encoded = serde_json::to_string(trail).map_err(|e| RecordError::Malformed(e.to_string()))?;
            form = form.text("audit_trail", encoded);
        }
        Ok(form)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<Response, RecordError> {
        request
            .send()
            .await
            .map_err(|e| RecordError::Transport(e.to_string()))
    }
}

/// Map a response to its `data` payload or a typed error.
async fn read_data<T: DeserializeOwned>(response: Response, subject: &str) -> Result<T, RecordError> {
    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| RecordError::Transport(e.to_string()))?;
    let envelope: Result<Envelope<T>, _> = serde_json::from_str(&text);

    if status.is_success() {
        return envelope
            .map_err(|e| RecordError::Malformed(e.to_string()))?
            .data
            .ok_or_else(|| RecordError::Malformed("response has no data".to_string()));
    }

    let (message, errors) = match envelope {
        Ok(env) => (env.message.unwrap_or_else(|| text.clone()), env.errors),
        Err(_) => (text.clone(), Vec::new()),
    };
    Err(status_error(status, message, errors, subject))
}

fn status_error(status: StatusCode, message: String, errors: Vec<String>, subject: &str) -> RecordError {
    match status {
        StatusCode::CONFLICT => RecordError::Conflict { field: message },
        StatusCode::BAD_REQUEST => {
            if errors.is_empty() {
                RecordError::Validation(vec![message])
            } else {
                RecordError::Validation(errors)
            }
        }
        StatusCode::NOT_FOUND => RecordError::NotFound(subject.to_string()),
        _ => RecordError::Status {
            status: status.as_u16(),
            message,
        },
    }
}

#[async_trait]
impl RecordStore for RestRecordStore {
    async fn create_tag(&self, tag: NewTag) -> Result<Tag, RecordError> {
        let form = Self::create_form(&tag)?;
        let response = self
            .send(self.client.post(self.create_url(tag.media_kind)).multipart(form))
            .await?;
        let data: TagData = read_data(response, tag.fingerprint.as_str()).await?;
        Ok(data.tag)
    }

    async fn get_tag(&self, id: &str) -> Result<Tag, RecordError> {
        let response = self.send(self.client.get(self.tag_url(id))).await?;
        let data: TagData = read_data(response, id).await?;
        Ok(data.tag)
    }

    async fn find_by_fingerprint(&self, fingerprint: &ContentFingerprint) -> Result<Option<Tag>, RecordError> {
        let url = format!("{}/hash/{}", self.base_url, fingerprint);
        let response = self.send(self.client.get(url)).await?;
        match read_data::<TagData>(response, fingerprint.as_str()).await {
            Ok(data) => Ok(Some(data.tag)),
            Err(RecordError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn delete_tag(&self, id: &str) -> Result<Tag, RecordError> {
        let tag = self.get_tag(id).await?;
        let response = self.send(self.client.delete(self.tag_url(id))).await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(status_error(status, message, Vec::new(), id));
        }
        Ok(tag)
    }

    async fn record_view(&self, id: &str) -> Result<u64, RecordError> {
        // Reads count as views on the hosted store.
        Ok(self.get_tag(id).await?.view_count)
    }

    async fn record_like(&self, id: &str) -> Result<u64, RecordError> {
        let url = format!("{}/like", self.tag_url(id));
        let response = self.send(self.client.post(url)).await?;
        let data: LikeData = read_data(response, id).await?;
        Ok(data.like_count)
    }

    async fn update_media_urls(
        &self,
        id: &str,
        kind: MediaKind,
        urls: Vec<String>,
    ) -> Result<Vec<String>, RecordError> {
        let before = self.get_tag(id).await?;
        let mut local = before.urls.clone();
        let orphaned = local.replace(kind, urls.clone());

        let field = match kind {
            MediaKind::Image => "img_urls",
            MediaKind::Video => "video_urls",
            MediaKind::Audio => "audio_urls",
        };
        let response = self
            .send(self.client.put(self.tag_url(id)).json(&json!({ field: urls })))
            .await?;
        let _: TagData = read_data(response, id).await?;
        Ok(orphaned)
    }

    async fn set_status(&self, id: &str, status: TagStatus) -> Result<Tag, RecordError> {
        let response = self
            .send(
                self.client
                    .put(self.tag_url(id))
                    .json(&json!({ "status": status.as_str() })),
            )
            .await?;
        let data: TagData = read_data(response, id).await?;
        Ok(data.tag)
    }

    async fn get_audit_trail(&self, tag_id: &str) -> Result<Option<AuditTrail>, RecordError> {
        let response = self.send(self.client.get(self.tag_url(tag_id))).await?;
        let data: TrailData = read_data(response, tag_id).await?;
        Ok(data.tag.audit_trail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_routes() {
        let store = RestRecordStore::new("https://api.example/api/tags/");
        assert_eq!(store.create_url(MediaKind::Image), "https://api.example/api/tags/with-images");
        assert_eq!(store.create_url(MediaKind::Video), "https://api.example/api/tags/with-videos");
        assert_eq!(store.create_url(MediaKind::Audio), "https://api.example/api/tags/with-audio");
        assert_eq!(store.tag_url("abc"), "https://api.example/api/tags/abc");
    }

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            status_error(StatusCode::CONFLICT, "hash_address already exists".into(), vec![], "x"),
            RecordError::Conflict { .. }
        ));
        match status_error(
            StatusCode::BAD_REQUEST,
            "Validation error".into(),
            vec!["File name is required".into()],
            "x",
        ) {
            RecordError::Validation(errors) => assert_eq!(errors, vec!["File name is required".to_string()]),
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(
            status_error(StatusCode::NOT_FOUND, String::new(), vec![], "x"),
            RecordError::NotFound(_)
        ));
        assert!(matches!(
            status_error(StatusCode::INTERNAL_SERVER_ERROR, "boom".into(), vec![], "x"),
            RecordError::Status { status: 500, .. }
        ));
    }

    #[test]
    fn test_parse_hosted_tag() {
        let body = r#"{
            "status": "success",
            "data": {"tag": {
                "id": "65f0c0ffee",
                "file_name": "sunset.png",
                "description": "",
                "hash_address": "0x6d255fc3390ee6b41191da315958b7d6a1e5b17904cc7683558f98acc57977b4",
                "mediacid": "QmA",
                "metadatacid": "QmB",
                "address": "0xabc",
                "type": "img",
                "img_urls": ["https://gw/ipfs/QmA"],
                "video_urls": [],
                "audio_urls": [],
                "file_count": 1,
                "is_bulk_upload": false,
                "status": "active",
                "view_count": 3,
                "like_count": 1,
                "total_media_count": 1,
                "primary_media_url": "https://gw/ipfs/QmA",
                "createdAt": "2024-05-01T10:00:00.000Z",
                "updatedAt": "2024-05-01T10:00:00.000Z",
                "audit_trail_id": null
            }}
        }"#;
        let envelope: Envelope<TagData> = serde_json::from_str(body).unwrap();
        let tag = envelope.data.unwrap().tag;
        assert_eq!(tag.media_kind, MediaKind::Image);
        assert_eq!(tag.view_count, 3);
        assert_eq!(tag.primary_media_url(), Some("https://gw/ipfs/QmA"));
        assert_eq!(tag.audit_trail_ref, None);
    }
}
