//! mle::dim_cycle — coordinate-wise maximum likelihood.
//!
//! One sweep fixes every parameter except one (through
//! [`fix_params`]), maximizes over that coordinate, writes the result
//! back and moves to the next coordinate. Sweeps repeat until the log
//! likelihood changes by at most `dim_cycle_tolerance` between two
//! consecutive sweeps, or until `max_iterations` sweeps have run.
//!
//! The result is `Converged` only when the sweeps settled and every
//! coordinate fit of the last sweep converged; otherwise it carries the
//! first failed status of that sweep.
//!
//! The tolerance is an absolute change in log likelihood. It does not
//! scale with the sample size, so large data sets usually want a larger
//! value than small ones.
use ndarray::array;
use rand::RngCore;

use crate::{
    composite::{base_model, fix_params},
    data::Dataset,
    mle::{
        engine::{attach_covariance, feasible_start, run, starting_point},
        settings::MleSettings,
    },
    model::{FailureKind, Model, ModelResult, ModelStatus},
};

/// Estimate `model` one coordinate at a time under `settings`.
pub(crate) fn cycle(
    data: &Dataset, mut model: Model, settings: &MleSettings, mut rng: Option<&mut dyn RngCore>,
) -> ModelResult<Model> {
    let tolerance = settings.dim_cycle_tolerance;
    let mut inner = settings.clone();
    inner.dim_cycle_tolerance = 0.0;
    inner.want_covariance = false;

    let start = starting_point(&model, settings)?;
    let mut theta = feasible_start(&mut model, start, data)?;
    model.set_packed(&theta)?;
    let mut ll = model.log_likelihood(data)?;
    let mut converged = false;
    let mut inner_status = ModelStatus::Converged;

    for sweep in 1..=settings.max_iterations {
        inner_status = ModelStatus::Converged;
        for i in 0..theta.len() {
            let mut template = model.clone();
            let mut fixed_values = theta.clone();
            fixed_values[i] = f64::NAN;
            template.set_packed(&fixed_values)?;
            let mut one_dim = fix_params(&template)?;
            let mut s = inner.clone();
            s.starting_point = Some(array![theta[i]]);
            one_dim.settings.add(s);

            let fit = run(data, one_dim, rng.as_mut().map(|r| &mut **r as &mut dyn RngCore))?;
            if fit.status != ModelStatus::Converged && inner_status == ModelStatus::Converged {
                log::debug!("coordinate {i} of '{}' ended {:?} in sweep {sweep}", model.name, fit.status);
                inner_status = fit.status;
            }
            theta = base_model(&fit)?.packed_parameters()?;
        }
        model.set_packed(&theta)?;
        let next = model.log_likelihood(data)?;
        let change = (next - ll).abs();
        log::debug!("dimension cycle {sweep} of '{}': ll = {next:.6} (change {change:.3e})", model.name);
        ll = next;
        if change <= tolerance {
            converged = true;
            break;
        }
    }

    model.status = if converged {
        if inner_status != ModelStatus::Converged {
            log::warn!("dimension cycling of '{}' settled, but a coordinate fit ended {inner_status:?}", model.name);
        }
        inner_status
    } else {
        log::warn!("dimension cycling of '{}' used all {} sweeps", model.name, settings.max_iterations);
        ModelStatus::Failed(FailureKind::MaxIterations)
    };
    if settings.want_covariance {
        attach_covariance(data, &mut model, settings.delta);
    }
    Ok(model)
}
