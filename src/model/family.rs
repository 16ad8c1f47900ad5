//! model::family — typed discriminant identifying what a model is.
//!
//! Family identity keys the conjugate-update registry and replaces matching
//! on human-readable model names. The display name is informational only.
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ModelFamily {
    Normal,
    Exponential,
    Gamma,
    Beta,
    Bernoulli,
    Binomial,
    Poisson,
    Uniform,
    Pmf,
    Stack,
    Cross,
    Mixture,
    FixedParams,
    Transform,
    DataConstrained,
    Composed,
    Product,
    /// User-defined family; the tag must be unique within a registry.
    Custom(u32),
}

impl fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelFamily::Normal => f.write_str("Normal distribution"),
            ModelFamily::Exponential => f.write_str("Exponential distribution"),
            ModelFamily::Gamma => f.write_str("Gamma distribution"),
            ModelFamily::Beta => f.write_str("Beta distribution"),
            ModelFamily::Bernoulli => f.write_str("Bernoulli distribution"),
            ModelFamily::Binomial => f.write_str("Binomial distribution"),
            ModelFamily::Poisson => f.write_str("Poisson distribution"),
            ModelFamily::Uniform => f.write_str("Uniform distribution"),
            ModelFamily::Pmf => f.write_str("PMF"),
            ModelFamily::Stack => f.write_str("Stack"),
            ModelFamily::Cross => f.write_str("Cross product"),
            ModelFamily::Mixture => f.write_str("Mixture"),
            ModelFamily::FixedParams => f.write_str("Fixed parameters"),
            ModelFamily::Transform => f.write_str("Coordinate transform"),
            ModelFamily::DataConstrained => f.write_str("Data-constrained"),
            ModelFamily::Composed => f.write_str("Data-composed"),
            ModelFamily::Product => f.write_str("Product"),
            ModelFamily::Custom(tag) => write!(f, "Custom family #{tag}"),
        }
    }
}
