//! GARCH(1,1) with Student-t innovations
//!
//! Native conditional-volatility estimator for daily percent returns:
//!
//! ```text
//! r_t      = μ + ε_t,   ε_t = σ_t z_t,   z_t ~ standardized t(ν)
//! σ²_t     = ω + α ε²_{t-1} + β σ²_{t-1}
//! ```
//!
//! Parameters are found by maximum likelihood with a Nelder–Mead simplex
//! over an unconstrained reparameterization that keeps ω > 0, α, β ≥ 0,
//! α + β < 1 and ν > 2. The variance recursion is seeded with an
//! exponentially weighted backcast of the first squared residuals.

use serde::{Deserialize, Serialize};
use statrs::function::gamma::ln_gamma;
use statrs::statistics::Statistics;

use crate::ports::{FitError, VolatilityModel};

/// Decay used for the variance backcast
const BACKCAST_DECAY: f64 = 0.94;
/// Observations used for the variance backcast
const BACKCAST_WINDOW: usize = 75;
/// Upper bound on α + β
const MAX_PERSISTENCE: f64 = 0.9999;
/// Lower bound on degrees of freedom
const MIN_DOF: f64 = 2.05;
/// Floor for conditional variance
const MIN_VARIANCE: f64 = 1e-12;

/// Optimizer settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GarchConfig {
    /// Maximum Nelder–Mead iterations before reporting non-convergence
    pub max_iterations: usize,
    /// Relative spread of simplex log-likelihoods treated as converged
    pub tolerance: f64,
    /// Minimum number of returns required for a fit
    pub min_observations: usize,
}

impl Default for GarchConfig {
    fn default() -> Self {
        Self {
            max_iterations: 10_000,
            tolerance: 1e-9,
            min_observations: 100,
        }
    }
}

/// Fitted GARCH(1,1)-t parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GarchParams {
    pub mu: f64,
    pub omega: f64,
    pub alpha: f64,
    pub beta: f64,
    /// Student-t degrees of freedom
    pub nu: f64,
}

impl GarchParams {
    pub fn persistence(&self) -> f64 {
        self.alpha + self.beta
    }

    /// Long-run variance ω / (1 - α - β)
    pub fn unconditional_variance(&self) -> Option<f64> {
        let gap = 1.0 - self.persistence();
        (gap > 0.0).then(|| self.omega / gap)
    }

    /// Periods for a variance shock to decay by half
    pub fn half_life(&self) -> Option<f64> {
        let p = self.persistence();
        (p > 0.0 && p < 1.0).then(|| -(2.0_f64.ln()) / p.ln())
    }

    fn from_unconstrained(theta: &[f64]) -> Self {
        let persistence = MAX_PERSISTENCE * sigmoid(theta[2]);
        let alpha = persistence * sigmoid(theta[3]);
        Self {
            mu: theta[0],
            omega: theta[1].exp(),
            alpha,
            beta: persistence - alpha,
            nu: MIN_DOF + theta[4].exp(),
        }
    }

    fn to_unconstrained(&self) -> Vec<f64> {
        let persistence = self.persistence();
        vec![
            self.mu,
            self.omega.ln(),
            logit(persistence / MAX_PERSISTENCE),
            logit(self.alpha / persistence),
            (self.nu - MIN_DOF).ln(),
        ]
    }
}

/// Result of a successful fit
#[derive(Debug, Clone, PartialEq)]
pub struct GarchFit {
    pub params: GarchParams,
    pub log_likelihood: f64,
    pub iterations: usize,
    /// One-step conditional volatility, same length as the input
    pub conditional_volatility: Vec<f64>,
}

/// GARCH(1,1) estimator with standardized Student-t errors
#[derive(Debug, Clone, Default)]
pub struct GarchT11 {
    config: GarchConfig,
}

impl GarchT11 {
    pub fn new(config: GarchConfig) -> Self {
        Self { config }
    }

    /// Fit the model by maximum likelihood
    pub fn estimate(&self, returns: &[f64]) -> Result<GarchFit, FitError> {
        let n = returns.len();
        if n < self.config.min_observations {
            return Err(FitError::InsufficientData {
                required: self.config.min_observations,
                actual: n,
            });
        }
        if returns.iter().any(|r| !r.is_finite()) {
            return Err(FitError::InvalidOutput("returns contain non-finite values".to_string()));
        }

        let mean = returns.iter().copied().mean();
        let variance = returns.iter().copied().variance();
        if !(variance > MIN_VARIANCE) {
            return Err(FitError::InvalidOutput("returns have zero variance".to_string()));
        }

        let start = GarchParams {
            mu: mean,
            omega: variance * 0.1,
            alpha: 0.1,
            beta: 0.8,
            nu: 8.0,
        };
        let steps = [0.1 * variance.sqrt(), 0.5, 0.5, 0.5, 0.5];

        let objective = |theta: &[f64]| {
            let params = GarchParams::from_unconstrained(theta);
            let nll = -log_likelihood(returns, &params);
            if nll.is_finite() { nll } else { f64::INFINITY }
        };

        let (theta, nll, iterations) = nelder_mead(
            objective,
            &start.to_unconstrained(),
            &steps,
            self.config.max_iterations,
            self.config.tolerance,
        )?;

        let params = GarchParams::from_unconstrained(&theta);
        let conditional_volatility: Vec<f64> = conditional_variance(returns, &params)
            .into_iter()
            .map(f64::sqrt)
            .collect();

        if conditional_volatility.iter().any(|v| !v.is_finite()) {
            return Err(FitError::InvalidOutput("non-finite conditional volatility".to_string()));
        }

        tracing::debug!(
            mu = params.mu,
            omega = params.omega,
            alpha = params.alpha,
            beta = params.beta,
            nu = params.nu,
            iterations,
            "GARCH(1,1)-t fitted"
        );

        Ok(GarchFit {
            params,
            log_likelihood: -nll,
            iterations,
            conditional_volatility,
        })
    }
}

impl VolatilityModel for GarchT11 {
    fn fit(&self, returns: &[f64]) -> Result<Vec<f64>, FitError> {
        self.estimate(returns).map(|fit| fit.conditional_volatility)
    }

    fn name(&self) -> &'static str {
        "garch11-t"
    }
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

fn logit(p: f64) -> f64 {
    let p = p.clamp(1e-9, 1.0 - 1e-9);
    (p / (1.0 - p)).ln()
}

/// Exponentially weighted mean of the first squared residuals
fn backcast(residuals: &[f64]) -> f64 {
    let tau = residuals.len().min(BACKCAST_WINDOW);
    let mut weight = 1.0;
    let mut weighted = 0.0;
    let mut total = 0.0;
    for e in &residuals[..tau] {
        weighted += weight * e * e;
        total += weight;
        weight *= BACKCAST_DECAY;
    }
    weighted / total
}

/// σ²_t for every observation
fn conditional_variance(returns: &[f64], params: &GarchParams) -> Vec<f64> {
    let residuals: Vec<f64> = returns.iter().map(|r| r - params.mu).collect();
    let seed = backcast(&residuals);

    let mut sigma2 = Vec::with_capacity(residuals.len());
    let mut prev_var = seed;
    let mut prev_sq = seed;
    for e in &residuals {
        let var = (params.omega + params.alpha * prev_sq + params.beta * prev_var).max(MIN_VARIANCE);
        sigma2.push(var);
        prev_var = var;
        prev_sq = e * e;
    }
    sigma2
}

/// Log-likelihood under standardized Student-t innovations
fn log_likelihood(returns: &[f64], params: &GarchParams) -> f64 {
    let nu = params.nu;
    let constant = ln_gamma((nu + 1.0) / 2.0)
        - ln_gamma(nu / 2.0)
        - 0.5 * (std::f64::consts::PI * (nu - 2.0)).ln();

    conditional_variance(returns, params)
        .iter()
        .zip(returns)
        .map(|(var, r)| {
            let e = r - params.mu;
            constant
                - 0.5 * var.ln()
                - (nu + 1.0) / 2.0 * (1.0 + e * e / (var * (nu - 2.0))).ln()
        })
        .sum()
}

/// Minimize `f` with the Nelder–Mead simplex method.
///
/// Returns the best point, its value and the iteration count, or
/// `NonConvergence` when the simplex has not collapsed within `max_iterations`.
fn nelder_mead<F>(
    f: F,
    start: &[f64],
    steps: &[f64],
    max_iterations: usize,
    tolerance: f64,
) -> Result<(Vec<f64>, f64, usize), FitError>
where
    F: Fn(&[f64]) -> f64,
{
    const REFLECT: f64 = 1.0;
    const EXPAND: f64 = 2.0;
    const CONTRACT: f64 = 0.5;
    const SHRINK: f64 = 0.5;

    let dim = start.len();
    let mut simplex: Vec<(Vec<f64>, f64)> = Vec::with_capacity(dim + 1);
    simplex.push((start.to_vec(), f(start)));
    for i in 0..dim {
        let mut vertex = start.to_vec();
        vertex[i] += steps[i];
        let value = f(&vertex);
        simplex.push((vertex, value));
    }

    let blend = |a: &[f64], b: &[f64], t: f64| -> Vec<f64> {
        a.iter().zip(b).map(|(x, y)| x + t * (y - x)).collect()
    };

    for iteration in 0..max_iterations {
        simplex.sort_by(|a, b| a.1.total_cmp(&b.1));

        let best = simplex[0].1;
        let worst = simplex[dim].1;
        if best.is_finite() && (worst - best).abs() <= tolerance * (best.abs() + tolerance) {
            let (point, value) = simplex.swap_remove(0);
            return Ok((point, value, iteration));
        }

        let centroid: Vec<f64> = (0..dim)
            .map(|j| simplex[..dim].iter().map(|(v, _)| v[j]).sum::<f64>() / dim as f64)
            .collect();
        let worst_point = simplex[dim].0.clone();

        // Reflection: centroid + (centroid - worst)
        let reflected = blend(&centroid, &worst_point, -REFLECT);
        let f_reflected = f(&reflected);

        if f_reflected < simplex[0].1 {
            let expanded = blend(&centroid, &worst_point, -EXPAND);
            let f_expanded = f(&expanded);
            simplex[dim] = if f_expanded < f_reflected {
                (expanded, f_expanded)
            } else {
                (reflected, f_reflected)
            };
            continue;
        }

        if f_reflected < simplex[dim - 1].1 {
            simplex[dim] = (reflected, f_reflected);
            continue;
        }

        let (contracted, f_contracted) = if f_reflected < worst {
            let point = blend(&centroid, &reflected, CONTRACT);
            let value = f(&point);
            (point, value)
        } else {
            let point = blend(&centroid, &worst_point, CONTRACT);
            let value = f(&point);
            (point, value)
        };

        if f_contracted < worst.min(f_reflected) {
            simplex[dim] = (contracted, f_contracted);
            continue;
        }

        let best_point = simplex[0].0.clone();
        for vertex in simplex.iter_mut().skip(1) {
            let shrunk = blend(&best_point, &vertex.0, SHRINK);
            let value = f(&shrunk);
            *vertex = (shrunk, value);
        }
    }

    Err(FitError::NonConvergence { iterations: max_iterations })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// Simulate GARCH(1,1) percent returns with a deterministic RNG
    fn simulate(n: usize, omega: f64, alpha: f64, beta: f64) -> Vec<f64> {
        let mut rng_state = 12345u64;
        let mut next_uniform = move || {
            rng_state = rng_state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            ((rng_state >> 11) as f64 + 0.5) / (1u64 << 53) as f64
        };

        let mut variance = omega / (1.0 - alpha - beta);
        let mut returns = Vec::with_capacity(n);
        for _ in 0..n {
            let u1 = next_uniform();
            let u2 = next_uniform();
            let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
            let r = variance.sqrt() * z;
            returns.push(0.05 + r);
            variance = omega + alpha * r * r + beta * variance;
        }
        returns
    }

    #[test]
    fn test_reparameterization_round_trip() {
        let params = GarchParams { mu: 0.05, omega: 0.02, alpha: 0.08, beta: 0.9, nu: 6.0 };
        let back = GarchParams::from_unconstrained(&params.to_unconstrained());
        assert_relative_eq!(back.omega, params.omega, epsilon = 1e-9);
        assert_relative_eq!(back.alpha, params.alpha, epsilon = 1e-9);
        assert_relative_eq!(back.beta, params.beta, epsilon = 1e-9);
        assert_relative_eq!(back.nu, params.nu, epsilon = 1e-9);
    }

    #[test]
    fn test_constraints_hold_for_any_theta() {
        for theta in [[0.0, -20.0, 30.0, -30.0, 10.0], [1.0, 5.0, -30.0, 30.0, -10.0]] {
            let p = GarchParams::from_unconstrained(&theta);
            assert!(p.omega > 0.0);
            assert!(p.alpha >= 0.0 && p.beta >= 0.0);
            assert!(p.persistence() < 1.0);
            assert!(p.nu > 2.0);
        }
    }

    #[test]
    fn test_fit_recovers_persistent_volatility() {
        let returns = simulate(1200, 0.05, 0.1, 0.85);
        let fit = GarchT11::default().estimate(&returns).unwrap();

        assert_eq!(fit.conditional_volatility.len(), returns.len());
        assert!(fit.conditional_volatility.iter().all(|v| *v > 0.0));
        assert!(fit.params.persistence() > 0.7, "{:?}", fit.params);
        assert!(fit.params.persistence() < 1.0);
        assert!(fit.log_likelihood.is_finite());
    }

    #[test]
    fn test_volatility_responds_to_shock() {
        let mut returns = simulate(600, 0.05, 0.1, 0.85);
        returns[500] = 15.0;
        let vol = GarchT11::default().fit(&returns).unwrap();
        assert!(vol[501] > vol[499]);
    }

    #[test]
    fn test_insufficient_data() {
        let err = GarchT11::default().fit(&[0.1; 20]).unwrap_err();
        assert_eq!(err, FitError::InsufficientData { required: 100, actual: 20 });
    }

    #[test]
    fn test_constant_returns_rejected() {
        let err = GarchT11::default().fit(&[0.5; 300]).unwrap_err();
        assert!(matches!(err, FitError::InvalidOutput(_)));
    }

    #[test]
    fn test_iteration_cap_reports_non_convergence() {
        let returns = simulate(300, 0.05, 0.1, 0.85);
        let model = GarchT11::new(GarchConfig { max_iterations: 3, ..Default::default() });
        assert_eq!(
            model.fit(&returns).unwrap_err(),
            FitError::NonConvergence { iterations: 3 }
        );
    }

    #[test]
    fn test_nelder_mead_minimizes_quadratic() {
        let f = |x: &[f64]| (x[0] - 3.0).powi(2) + 2.0 * (x[1] + 1.0).powi(2);
        let (x, value, _) = nelder_mead(f, &[0.0, 0.0], &[1.0, 1.0], 2000, 1e-14).unwrap();
        assert_relative_eq!(x[0], 3.0, epsilon = 1e-3);
        assert_relative_eq!(x[1], -1.0, epsilon = 1e-3);
        assert!(value < 1e-6);
    }

    #[test]
    fn test_half_life() {
        let params = GarchParams { mu: 0.0, omega: 0.1, alpha: 0.05, beta: 0.9, nu: 8.0 };
        assert_relative_eq!(params.half_life().unwrap(), 2f64.ln() / -(0.95f64.ln()), epsilon = 1e-12);
        assert_relative_eq!(params.unconditional_variance().unwrap(), 2.0, epsilon = 1e-9);
    }
}
