// src/models/readings.rs

//! Provider records and the normalized artifacts extracted from them.

use serde::{Deserialize, Serialize};

/// First entry of the provider's JSON array for a day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRecord {
    /// Human-readable day label, e.g. "16/03/2022 - Miércoles de la 2ª semana de Cuaresma."
    #[serde(rename = "post_title")]
    pub title: String,

    /// Embedded HTML holding every section of the day
    #[serde(rename = "post_content")]
    pub html_body: String,
}

/// Normalized text of one section on one day.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub day: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub reference: String,
    #[serde(default)]
    pub content: String,
}

impl Artifact {
    /// Artifact for a section that is not published on this day.
    pub fn day_only(day: impl Into<String>) -> Self {
        Self {
            day: day.into(),
            ..Default::default()
        }
    }

    pub fn has_content(&self) -> bool {
        !self.content.is_empty()
    }
}

/// Every section of one day, as handed to the transport layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyReadings {
    pub day: String,
    pub first_lecture: Artifact,
    pub psalm: Artifact,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub second_lecture: Option<Artifact>,
    pub gospel: Artifact,
}

impl DailyReadings {
    /// Group the four sections. The second lecture is kept only when it has a body.
    pub fn assemble(
        first_lecture: Artifact,
        psalm: Artifact,
        second_lecture: Artifact,
        gospel: Artifact,
    ) -> Self {
        Self {
            day: gospel.day.clone(),
            first_lecture,
            psalm,
            second_lecture: second_lecture.has_content().then_some(second_lecture),
            gospel,
        }
    }

    /// Sections in delivery order.
    pub fn sections(&self) -> Vec<&Artifact> {
        let mut sections = vec![&self.first_lecture, &self.psalm];
        if let Some(second) = &self.second_lecture {
            sections.push(second);
        }
        sections.push(&self.gospel);
        sections
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn artifact(content: &str) -> Artifact {
        Artifact {
            day: "20/03/2022".into(),
            title: "t".into(),
            reference: "r".into(),
            content: content.into(),
        }
    }

    #[test]
    fn raw_record_ignores_unknown_provider_fields() {
        let json = r#"{"ID":"1","post_title":"day","post_content":"<p>x</p>","post_status":"publish"}"#;
        let raw: RawRecord = serde_json::from_str(json).unwrap();
        assert_eq!(raw.title, "day");
        assert_eq!(raw.html_body, "<p>x</p>");
    }

    #[test]
    fn empty_second_lecture_is_omitted_from_envelope() {
        let readings = DailyReadings::assemble(
            artifact("a"),
            artifact("b"),
            Artifact::day_only("20/03/2022"),
            artifact("d"),
        );
        assert!(readings.second_lecture.is_none());
        assert_eq!(readings.sections().len(), 3);

        let value = serde_json::to_value(&readings).unwrap();
        assert!(value.get("second_lecture").is_none());
        assert_eq!(value["gospel"]["content"], "d");
    }

    #[test]
    fn second_lecture_with_body_is_kept_in_order() {
        let readings =
            DailyReadings::assemble(artifact("a"), artifact("b"), artifact("c"), artifact("d"));
        let contents: Vec<&str> = readings
            .sections()
            .iter()
            .map(|a| a.content.as_str())
            .collect();
        assert_eq!(contents, vec!["a", "b", "c", "d"]);
        assert_eq!(readings.day, "20/03/2022");
    }
}
