//! Metadata documents pinned next to the media they describe.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::detection::DetectionResult;
use crate::media::MediaItem;

use super::pinning::PinObject;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Probabilities {
    #[serde(rename = "deepfake")]
    pub synthetic: u8,
    pub natural: u8,
}

/// Metadata document for a single registration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionMetadata {
    pub file_name: String,
    pub description: String,
    pub signer_address: String,
    pub probabilities: Probabilities,
    pub content_analysis: String,
    pub authentic_indicators: String,
    #[serde(rename = "deepfakeIndicators")]
    pub synthetic_indicators: String,
}

impl SubmissionMetadata {
    pub fn new(item: &MediaItem, result: &DetectionResult, signer: &str) -> Self {
        Self {
            file_name: item.display_name.clone(),
            description: item.description.clone(),
            signer_address: signer.to_string(),
            probabilities: Probabilities {
                synthetic: result.synthetic_probability,
                natural: result.natural_probability,
            },
            content_analysis: result.reasoning.content_analysis.clone(),
            authentic_indicators: result.reasoning.authentic_indicators.clone(),
            synthetic_indicators: result.reasoning.synthetic_indicators.clone(),
        }
    }

    pub fn to_pin_object(&self) -> Result<PinObject, serde_json::Error> {
        Ok(PinObject::json("metadata.json", serde_json::to_vec_pretty(self)?))
    }
}

/// One entry of a collection document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionFile {
    pub name: String,
    pub description: String,
    pub media_type: String,
    pub detection_result: DetectionResult,
    #[serde(rename = "cloudinaryUrl", default, skip_serializing_if = "Option::is_none")]
    pub storage_ref: Option<String>,
}

impl CollectionFile {
    pub fn new(item: &MediaItem, result: &DetectionResult) -> Self {
        Self {
            name: item.display_name.clone(),
            description: item.description.clone(),
            media_type: item.media_kind.as_str().to_string(),
            detection_result: result.clone(),
            storage_ref: result.storage_ref.clone(),
        }
    }
}

/// Metadata document for a bulk registration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionMetadata {
    pub collection_name: String,
    pub collection_description: String,
    pub total_files: usize,
    pub files: Vec<CollectionFile>,
    pub uploader: String,
    /// RFC 3339.
    pub timestamp: String,
    pub is_bulk_upload: bool,
}

impl CollectionMetadata {
    pub fn new(name: &str, description: &str, files: Vec<CollectionFile>, uploader: &str) -> Self {
        let collection_name = if name.trim().is_empty() {
            "My Collection".to_string()
        } else {
            name.to_string()
        };
        Self {
            collection_name,
            collection_description: description.to_string(),
            total_files: files.len(),
            files,
            uploader: uploader.to_string(),
            timestamp: Utc::now().to_rfc3339(),
            is_bulk_upload: true,
        }
    }

    pub fn to_pin_object(&self) -> Result<PinObject, serde_json::Error> {
        Ok(PinObject::json("bulk-metadata.json", serde_json::to_vec(self)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::Reasoning;
    use crate::media::MediaKind;

    fn result(natural: u8) -> DetectionResult {
        DetectionResult {
            media_kind: "image".to_string(),
            synthetic_probability: 100 - natural,
            natural_probability: natural,
            reasoning: Reasoning {
                content_analysis: "clean sensor noise".to_string(),
                ..Reasoning::default()
            },
            storage_ref: Some("https://host/a.png".to_string()),
            storage_ref_id: None,
        }
    }

    #[test]
    fn test_submission_document_keys() {
        let item = MediaItem::new(vec![1], "a.png", MediaKind::Image, "beach");
        let doc = SubmissionMetadata::new(&item, &result(95), "0xabc");
        let json = serde_json::to_value(&doc).unwrap();

        assert_eq!(json["fileName"], "a.png");
        assert_eq!(json["signerAddress"], "0xabc");
        assert_eq!(json["probabilities"]["deepfake"], 5);
        assert_eq!(json["probabilities"]["natural"], 95);
        assert_eq!(json["contentAnalysis"], "clean sensor noise");
        assert!(json.get("deepfakeIndicators").is_some());
    }

    #[test]
    fn test_collection_document() {
        let a = MediaItem::new(vec![1], "a.png", MediaKind::Image, "");
        let b = MediaItem::new(vec![2], "b.mp4", MediaKind::Video, "");
        let files = vec![CollectionFile::new(&a, &result(95)), CollectionFile::new(&b, &result(91))];
        let doc = CollectionMetadata::new("", "trip", files, "0xabc");

        assert_eq!(doc.collection_name, "My Collection");
        assert_eq!(doc.total_files, 2);
        assert!(doc.is_bulk_upload);

        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["isBulkUpload"], true);
        assert_eq!(json["totalFiles"], 2);
        assert_eq!(json["files"][1]["mediaType"], "video");
        assert_eq!(json["files"][0]["cloudinaryUrl"], "https://host/a.png");
    }
}
