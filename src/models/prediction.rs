use serde::{ Serialize, Deserialize };

/// Patient intake form. Every field arrives as the raw string the form collected.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredictionForm {
    #[serde(default)]
    pub donor_age: String,
    #[serde(default)]
    pub age_at_hct: String,
    #[serde(default)]
    pub prim_disease_hct: String,
    #[serde(default)]
    pub year_hct: String,
    #[serde(default)]
    pub dri_score: String,
    #[serde(default)]
    pub comorbidity_score: String,
    #[serde(default)]
    pub gvhd_proph: String,
    #[serde(default)]
    pub karnofsky_score: String,
    #[serde(default)]
    pub race_group: String,
    #[serde(default)]
    pub cyto_score: String,
}

impl PredictionForm {
    fn fields(&self) -> [(&'static str, &str); 10] {
        [
            ("donor_age", self.donor_age.as_str()),
            ("age_at_hct", self.age_at_hct.as_str()),
            ("prim_disease_hct", self.prim_disease_hct.as_str()),
            ("year_hct", self.year_hct.as_str()),
            ("dri_score", self.dri_score.as_str()),
            ("comorbidity_score", self.comorbidity_score.as_str()),
            ("gvhd_proph", self.gvhd_proph.as_str()),
            ("karnofsky_score", self.karnofsky_score.as_str()),
            ("race_group", self.race_group.as_str()),
            ("cyto_score", self.cyto_score.as_str()),
        ]
    }

    /// Names of blank required fields, in form order.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        self.fields()
            .into_iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(name, _)| name)
            .collect()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub survival_probability: f64,
    pub risk_category: String,
    pub confidence_interval: (f64, f64),
    pub recommendations: Vec<String>,
}
