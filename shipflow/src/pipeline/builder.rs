//! Pipeline builder with artifact-wiring validation.

use super::Pipeline;
use crate::errors::PipelineValidationError;
use crate::stage::Stage;
use std::collections::{HashMap, HashSet};

/// Builder for creating validated pipelines.
///
/// Validation runs as stages are added: stage and action names must be
/// unique, each artifact may have only one producer, and every declared
/// input must be produced by an earlier stage or by a strictly lower
/// run-order band of the same stage.
#[derive(Debug, Default)]
pub struct PipelineBuilder {
    name: String,
    stages: Vec<Stage>,
    produced: HashMap<String, String>,
    action_names: HashSet<String>,
}

impl PipelineBuilder {
    /// Creates a new builder.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stages: Vec::new(),
            produced: HashMap::new(),
            action_names: HashSet::new(),
        }
    }

    /// Appends a stage.
    ///
    /// # Errors
    ///
    /// Returns an error if names collide or artifact wiring is invalid.
    pub fn stage(mut self, stage: Stage) -> Result<Self, PipelineValidationError> {
        if self.stages.iter().any(|s| s.name() == stage.name()) {
            return Err(PipelineValidationError::new(format!(
                "duplicate stage name '{}'",
                stage.name()
            ))
            .with_stages(vec![stage.name().to_string()]));
        }

        self.validate_actions(&stage)?;
        self.stages.push(stage);
        Ok(self)
    }

    /// Builds the pipeline.
    ///
    /// # Errors
    ///
    /// Returns an error if the builder has no stages.
    pub fn build(self) -> Result<Pipeline, PipelineValidationError> {
        if self.stages.is_empty() {
            return Err(PipelineValidationError::new("pipeline has no stages"));
        }
        Ok(Pipeline::new(self.name, self.stages))
    }

    /// Returns the pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the number of stages added so far.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    fn validate_actions(&mut self, stage: &Stage) -> Result<(), PipelineValidationError> {
        // Inputs may come from earlier stages or from strictly lower bands
        // of this stage; band order is what makes intra-stage wiring sound.
        let mut ordered: Vec<_> = stage.actions().iter().collect();
        ordered.sort_by_key(|a| a.run_order());

        let mut available: HashSet<String> = self.produced.keys().cloned().collect();
        let mut band_outputs: Vec<String> = Vec::new();
        let mut current_band: Option<u32> = None;

        for action in ordered {
            if !self.action_names.insert(action.name().to_string()) {
                return Err(PipelineValidationError::new(format!(
                    "duplicate action name '{}'",
                    action.name()
                ))
                .with_stages(vec![stage.name().to_string()]));
            }

            if current_band != Some(action.run_order()) {
                available.extend(band_outputs.drain(..));
                current_band = Some(action.run_order());
            }

            for input in action.inputs() {
                if !available.contains(input) {
                    return Err(PipelineValidationError::new(format!(
                        "action '{}' consumes artifact '{}' which no earlier action produces",
                        action.name(),
                        input
                    ))
                    .with_stages(vec![stage.name().to_string()]));
                }
            }

            for output in action.outputs() {
                if let Some(producer) = self.produced.get(output) {
                    return Err(PipelineValidationError::new(format!(
                        "artifact '{}' produced by both '{}' and '{}'",
                        output,
                        producer,
                        action.name()
                    ))
                    .with_stages(vec![stage.name().to_string()]));
                }
                self.produced
                    .insert(output.clone(), action.name().to_string());
                band_outputs.push(output.clone());
            }
        }

        Ok(())
    }
}
