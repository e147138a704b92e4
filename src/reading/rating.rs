use super::Reading;

/// One row of a stage-to-flow rating curve.
#[derive(Debug, Clone, PartialEq)]
pub struct Rating {
    pub stage: String,
    pub stage_units: String,
    pub flow: String,
    pub flow_units: String,
}

impl Rating {
    pub fn new(stage: &str, stage_units: &str, flow: &str, flow_units: &str) -> Self {
        Rating {
            stage: stage.to_string(),
            stage_units: stage_units.to_string(),
            flow: flow.to_string(),
            flow_units: flow_units.to_string(),
        }
    }
}

impl Reading for Rating {
    fn to_line(&self, _datetime_format: &str) -> String {
        format!(
            "{}\t{}\t{}\t{}",
            self.stage, self.stage_units, self.flow, self.flow_units
        )
    }
}
