use crate::{data::DataError, model::capability::Capability, optimization::errors::OptError};

/// Result alias for model-level operations.
pub type ModelResult<T> = Result<T, ModelError>;

#[derive(Debug, Clone, PartialEq)]
pub enum ModelError {
    // ---- Estimation ----
    /// Model has neither an estimator nor a density/log-likelihood.
    NotEstimable { model: String },

    /// Optimizer stopped making progress before convergence.
    OptimizerStuck { model: String, reason: String },

    /// An evaluator returned NaN; carries the offending parameter vector.
    NumericDivergence { params: Vec<f64>, context: &'static str },

    /// The constraint could not move the starting point into the feasible
    /// region.
    InfeasibleStart { params: Vec<f64> },

    // ---- Composition ----
    /// A composite's data split disagrees with its sub-models' layout.
    CompositeShapeMismatch { composite: &'static str, expected: usize, found: usize },

    /// Composite builders need at least one sub-model.
    EmptyComposite { composite: &'static str },

    // ---- Capabilities and state ----
    /// The requested behavior is not available on this model.
    MissingCapability { model: String, capability: Capability },

    /// A settings group the operation requires is not attached.
    MissingSettings { group: &'static str },

    /// Settings values failed validation.
    InvalidSettings { group: &'static str, reason: String },

    /// The model has no parameter block yet.
    NotParameterized { model: String },

    /// A parameter value is outside its domain.
    InvalidParameter { name: &'static str, value: f64, reason: &'static str },

    /// Parameter count passed in does not match the model's shape.
    ParameterCountMismatch { expected: usize, found: usize },

    /// The operation needs the data set the model was estimated on.
    MissingData { model: String },

    /// Rejection sampling found no acceptable draw within its budget.
    RejectionBudget { model: String, tries: usize },

    // ---- Wrapped ----
    Data(DataError),
    Optimization(OptError),
}

impl std::error::Error for ModelError {}

impl std::fmt::Display for ModelError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelError::NotEstimable { model } => write!(
                f,
                "Model '{model}' has no estimate routine and neither a log likelihood nor a density"
            ),
            ModelError::OptimizerStuck { model, reason } => {
                write!(f, "Optimizer stuck while estimating '{model}': {reason}")
            }
            ModelError::NumericDivergence { params, context } => {
                write!(f, "NaN encountered in {context} at parameters {params:?}")
            }
            ModelError::InfeasibleStart { params } => {
                write!(f, "Constraint could not project starting point {params:?} into the feasible region")
            }
            ModelError::CompositeShapeMismatch { composite, expected, found } => write!(
                f,
                "{composite}: data layout does not match sub-models (expected {expected}, found {found})"
            ),
            ModelError::EmptyComposite { composite } => {
                write!(f, "{composite}: at least one sub-model is required")
            }
            ModelError::MissingCapability { model, capability } => {
                write!(f, "Model '{model}' has no {capability} capability")
            }
            ModelError::MissingSettings { group } => {
                write!(f, "Required settings group '{group}' is not attached")
            }
            ModelError::InvalidSettings { group, reason } => {
                write!(f, "Invalid '{group}' settings: {reason}")
            }
            ModelError::NotParameterized { model } => {
                write!(f, "Model '{model}' has no parameters")
            }
            ModelError::InvalidParameter { name, value, reason } => {
                write!(f, "Invalid parameter {name} = {value}: {reason}")
            }
            ModelError::ParameterCountMismatch { expected, found } => {
                write!(f, "Expected {expected} parameters, found {found}")
            }
            ModelError::MissingData { model } => {
                write!(f, "Model '{model}' carries no data set")
            }
            ModelError::RejectionBudget { model, tries } => {
                write!(f, "No draw from '{model}' satisfied its constraint in {tries} tries")
            }
            ModelError::Data(err) => write!(f, "Data error: {err}"),
            ModelError::Optimization(err) => write!(f, "Optimization error: {err}"),
        }
    }
}

impl From<DataError> for ModelError {
    fn from(err: DataError) -> Self {
        ModelError::Data(err)
    }
}

impl From<OptError> for ModelError {
    fn from(err: OptError) -> Self {
        match err {
            OptError::NumericDivergence { theta } => {
                ModelError::NumericDivergence { params: theta, context: "objective" }
            }
            other => ModelError::Optimization(other),
        }
    }
}
