//! composite::dcompose — a model evaluated on another model's draws.
//!
//! Purpose
//! -------
//! Chain two models: a generator produces `CompositionSettings::draws`
//! random rows and a second model scores them. The composite's log
//! likelihood is `ll_second(draws_generator)`, whatever data it is handed.
//!
//! Key behaviors
//! -------------
//! - Parameters are the generator's packed parameters followed by the
//!   second model's.
//! - The generator's draws are fed from random words taken once from the
//!   caller's generator when the composite is built. Every evaluation
//!   replays the same words, so the log likelihood is a deterministic
//!   function of the parameters and can be optimized.
//! - The constraint projects the generator on the data and the second
//!   model on an empty data set; penalties add up.
//! - Estimation goes through the MLE engine; there is no closed form.
use std::sync::Arc;

use ndarray::Array1;
use rand::RngCore;

use crate::{
    composite::{
        Components, Replay, WORDS_PER_DRAW, cached_words, components, concat_parameters, distribute,
        known_parameter_count, prep_part, reset_outputs, state,
    },
    data::Dataset,
    model::{
        Capability, CapabilitySet, Model, ModelError, ModelFamily, ModelKernel, ModelResult, ModelShape,
        Projection, shape::Dim,
    },
    settings_group,
};

const DCOMPOSE_GROUP: &str = "composition";

/// Number of generator draws each evaluation scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompositionSettings {
    pub draws: usize,
}

settings_group!(CompositionSettings, "composition settings");

impl Default for CompositionSettings {
    fn default() -> Self {
        Self { draws: 10_000 }
    }
}

impl CompositionSettings {
    /// # Errors
    /// - [`ModelError::InvalidSettings`] when `draws` is zero.
    pub fn new(draws: usize) -> ModelResult<Self> {
        if draws == 0 {
            return Err(ModelError::InvalidSettings {
                group: "composition settings",
                reason: "draws must be at least one".to_string(),
            });
        }
        Ok(Self { draws })
    }
}

/// Cached random words for the generator.
#[derive(Debug, Clone)]
pub(crate) struct ComposeState {
    stream: Arc<[u64]>,
}

settings_group!(ComposeState, DCOMPOSE_GROUP);

#[derive(Debug, Clone, Copy)]
pub(crate) struct DcomposeKernel {
    caps: CapabilitySet,
}

/// Score `second` on draws from `generator`.
///
/// `CompositionSettings::default().draws` × [`WORDS_PER_DRAW`] words are
/// read from `rng` here; a larger draw budget set later wraps around the
/// cached stream.
pub fn dcompose(generator: &Model, second: &Model, rng: &mut dyn RngCore) -> ModelResult<Model> {
    let models = [generator.clone(), second.clone()];
    let gen_caps = generator.capabilities();
    let second_caps = second.capabilities();
    let evaluable = gen_caps.contains(Capability::Draw) && second_caps.can_evaluate();
    let caps = CapabilitySet::default()
        .with_if(Capability::LogLikelihood, evaluable)
        .with_if(
            Capability::Constraint,
            gen_caps.contains(Capability::Constraint) || second_caps.contains(Capability::Constraint),
        )
        .with(Capability::Prep);
    let shape = ModelShape {
        vsize: known_parameter_count(&models).map_or(Dim::FromData, Dim::Fixed),
        msize1: Dim::Fixed(0),
        msize2: Dim::Fixed(0),
        dsize: second.shape.dsize,
    };

    let mut model = Model::new(
        format!("{} composed with {}", generator.name, second.name),
        ModelFamily::Composed,
        shape,
        Arc::new(DcomposeKernel { caps }),
    );
    if models.iter().all(|m| m.parameters.is_some()) {
        model.parameters = Some(Dataset::from_vector(concat_parameters(&models)?));
    }
    let budget = CompositionSettings::default();
    let stream = cached_words(rng, budget.draws * WORDS_PER_DRAW);
    model.settings.add(budget);
    model.settings.add(ComposeState { stream });
    model.settings.add(Components { models: models.to_vec() });
    Ok(model)
}

impl DcomposeKernel {
    /// Generator and second model carrying the composite's parameters.
    fn parts(&self, model: &Model) -> ModelResult<(Model, Model)> {
        let mut parts = distribute(components(model)?, &model.packed_parameters()?, 0)?.into_iter();
        match (parts.next(), parts.next()) {
            (Some(generator), Some(second)) => Ok((generator, second)),
            _ => Err(ModelError::EmptyComposite { composite: "dcompose" }),
        }
    }

    /// The generator's draws from the cached stream, as a data set.
    fn generated(&self, model: &Model, generator: &Model) -> ModelResult<Dataset> {
        let st = state::<ComposeState>(model, DCOMPOSE_GROUP)?;
        let count = model.settings.get_or_default::<CompositionSettings>().draws;
        let draws = generator.draws(&mut Replay::new(&st.stream), count)?;
        Ok(if draws.ncols() == 1 {
            Dataset::from_vector(draws.column(0).to_owned())
        } else {
            Dataset::from_matrix(draws)
        })
    }
}

impl ModelKernel for DcomposeKernel {
    fn capabilities(&self) -> CapabilitySet {
        self.caps
    }

    fn log_likelihood(&self, _data: &Dataset, model: &Model) -> ModelResult<f64> {
        let (generator, second) = self.parts(model)?;
        second.log_likelihood(&self.generated(model, &generator)?)
    }

    fn constraint(&self, data: &Dataset, model: &Model) -> ModelResult<Projection> {
        let (generator, second) = self.parts(model)?;
        let empty = Dataset::default();
        let mut point = Vec::with_capacity(model.parameter_count());
        let mut penalty = 0.0;
        for (part, on) in [(&generator, data), (&second, &empty)] {
            if part.has(Capability::Constraint) {
                let proj = part.constraint(on)?;
                point.extend(proj.point.iter().copied());
                penalty += proj.penalty;
            } else {
                point.extend(part.packed_parameters()?.iter().copied());
            }
        }
        Ok(Projection { point: Array1::from(point), penalty })
    }

    fn prep(&self, data: &Arc<Dataset>, model: &mut Model) -> ModelResult<()> {
        let subs = components(model)?.to_vec();
        let mut prepped = Vec::with_capacity(subs.len());
        for sub in &subs {
            let mut part = prep_part(data, sub)?;
            if sub.parameters.is_none() {
                let k = part.parameter_count();
                part.set_packed(&Array1::ones(k))?;
            }
            prepped.push(part);
        }
        model.parameters = Some(Dataset::from_vector(concat_parameters(&prepped)?));
        model.settings.add(Components { models: prepped });
        reset_outputs(model, data);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        composite::{base_model, fix_params},
        distributions::{exponential, normal},
        estimation::estimate,
        mle::MleSettings,
        optimization::loglik_optimizer::MleMethod,
    };
    use approx::assert_relative_eq;
    use ndarray::array;
    use rand::{SeedableRng, rngs::StdRng};

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - The log likelihood as the second model's score of replayed draws.
    // - The combined constraint.
    // - Estimation of a free generator parameter.
    // -------------------------------------------------------------------------

    fn standard() -> Model {
        normal().with_parameters(&[0.0, 1.0]).expect("normal")
    }

    #[test]
    // Purpose
    // -------
    // The composite scores the generator's draws from the words cached at
    // construction, and ignores its own data.
    //
    // Given
    // -----
    // - N(0, 1) feeding N(0, 1); the composite built on a generator seeded
    //   with 4; the same words cached from a second generator seeded with
    //   4.
    //
    // Expect
    // ------
    // - Parameters (0, 1, 0, 1); ll equals N(0, 1)'s ll of the replayed
    //   draws on any data; the mean ll per draw is within 0.05 of
    //   -ln(2π)/2 - 1/2.
    fn scores_replayed_generator_draws() {
        // Arrange
        let m = dcompose(&standard(), &standard(), &mut StdRng::seed_from_u64(4)).expect("dcompose");
        let count = CompositionSettings::default().draws;
        let words = cached_words(&mut StdRng::seed_from_u64(4), count * WORDS_PER_DRAW);
        let draws = standard().draws(&mut Replay::new(&words), count).expect("draws");

        // Act
        let ll = m.log_likelihood(&Dataset::from_vector(array![100.0])).expect("ll");

        // Assert
        assert_eq!(m.packed_parameters().expect("params"), array![0.0, 1.0, 0.0, 1.0]);
        let expected = standard().log_likelihood(&Dataset::from_vector(draws.column(0).to_owned())).expect("ll");
        assert_relative_eq!(ll, expected, max_relative = 1e-12);
        let per_draw = ll / count as f64;
        let analytic = -0.5 * (2.0 * std::f64::consts::PI).ln() - 0.5;
        assert!((per_draw - analytic).abs() < 0.05, "{per_draw} vs {analytic}");
        assert_eq!(m.name, "Normal distribution composed with Normal distribution");
    }

    #[test]
    // Purpose
    // -------
    // The constraint projects each part and adds the penalties.
    //
    // Given
    // -----
    // - Exponential(-1) feeding N(0, 1).
    //
    // Expect
    // ------
    // - A positive penalty; the rate moved to a non-negative value; the
    //   Normal's (0, 1) untouched.
    fn constraint_combines_parts() {
        // Arrange
        let generator = exponential().with_parameters(&[-1.0]).expect("exponential");
        let m = dcompose(&generator, &standard(), &mut StdRng::seed_from_u64(1)).expect("dcompose");

        // Act
        let proj = m.constraint(&Dataset::from_vector(array![1.0])).expect("constraint");

        // Assert
        assert!(proj.penalty > 0.0);
        assert!(proj.point[0] >= 0.0);
        assert_eq!(proj.point.slice(ndarray::s![1..]).to_owned(), array![0.0, 1.0]);
    }

    #[test]
    // Purpose
    // -------
    // Maximum likelihood over a free generator mean lines its draws up
    // with the second model.
    //
    // Given
    // -----
    // - N(μ, 1) feeding N(3, 1) with only μ free, 1000 draws, simplex
    //   settings.
    //
    // Expect
    // ------
    // - μ within 0.15 of 3 (3 minus the mean of the cached standard
    //   normals); the other parameters unchanged.
    fn estimate_moves_generator_toward_second_model() {
        // Arrange
        let second = normal().with_parameters(&[3.0, 1.0]).expect("normal");
        let mut template = dcompose(&standard(), &second, &mut StdRng::seed_from_u64(6)).expect("dcompose");
        template.settings.add(CompositionSettings::new(1000).expect("valid draws"));
        template.set_packed(&array![f64::NAN, 1.0, 3.0, 1.0]).expect("template");
        template.settings.add(
            MleSettings::new(Some(MleMethod::NelderMead), 0.5, 1e-10, 2000).expect("valid settings"),
        );

        // Act
        let fit = estimate(&Arc::new(Dataset::from_vector(array![0.0])), &fix_params(&template).expect("wrapper"))
            .expect("estimate");
        let full = base_model(&fit).expect("base").packed_parameters().expect("params");

        // Assert
        assert!((full[0] - 3.0).abs() < 0.15, "mu = {}", full[0]);
        assert_eq!(full.slice(ndarray::s![1..]).to_owned(), array![1.0, 3.0, 1.0]);
        assert!(CompositionSettings::new(0).is_err());
    }
}
