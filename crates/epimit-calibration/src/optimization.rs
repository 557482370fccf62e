//! Solver setup and execution for calibration problems.

use argmin::core::Executor;
use argmin::solver::neldermead::NelderMead;
use argmin::solver::particleswarm::ParticleSwarm;
use log::info;

use crate::error::CalibrationError;
use crate::problem::CalibrationProblem;

/// Configuration for Nelder-Mead optimization.
#[derive(Debug, Clone)]
pub struct NelderMeadConfig {
    pub max_iterations: u64,

    /// Sample standard deviation tolerance (convergence criterion).
    pub sd_tolerance: f64,

    /// Reflection parameter; argmin's default is 1.0.
    pub alpha: Option<f64>,

    /// Expansion parameter; argmin's default is 2.0.
    pub gamma: Option<f64>,

    /// Contraction parameter; argmin's default is 0.5.
    pub rho: Option<f64>,

    /// Shrinking parameter; argmin's default is 0.5.
    pub sigma: Option<f64>,

    /// Log each iteration through the slog observer.
    pub verbose: bool,
}

impl Default for NelderMeadConfig {
    fn default() -> Self {
        Self {
            max_iterations: 1000,
            sd_tolerance: 1e-6,
            alpha: None,
            gamma: None,
            rho: None,
            sigma: None,
            verbose: false,
        }
    }
}

impl NelderMeadConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_iterations(mut self, max_iterations: u64) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_sd_tolerance(mut self, tolerance: f64) -> Self {
        self.sd_tolerance = tolerance;
        self
    }

    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = Some(alpha);
        self
    }

    pub fn with_gamma(mut self, gamma: f64) -> Self {
        self.gamma = Some(gamma);
        self
    }

    pub fn with_rho(mut self, rho: f64) -> Self {
        self.rho = Some(rho);
        self
    }

    pub fn with_sigma(mut self, sigma: f64) -> Self {
        self.sigma = Some(sigma);
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

/// Configuration for Particle Swarm Optimization.
#[derive(Debug, Clone)]
pub struct ParticleSwarmConfig {
    pub num_particles: usize,

    pub max_iterations: u64,

    /// Stop once the cost reaches this value.
    pub target_cost: Option<f64>,

    /// Inertia weight; argmin's default is 1/(2 ln 2).
    pub inertia_factor: Option<f64>,

    /// Attraction to the particle's personal best; default 0.5 + ln 2.
    pub cognitive_factor: Option<f64>,

    /// Attraction to the swarm best; default 0.5 + ln 2.
    pub social_factor: Option<f64>,

    pub verbose: bool,
}

impl Default for ParticleSwarmConfig {
    fn default() -> Self {
        Self {
            num_particles: 20,
            max_iterations: 1000,
            target_cost: None,
            inertia_factor: None,
            cognitive_factor: None,
            social_factor: None,
            verbose: false,
        }
    }
}

impl ParticleSwarmConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_num_particles(mut self, num_particles: usize) -> Self {
        self.num_particles = num_particles;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: u64) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_target_cost(mut self, target_cost: f64) -> Self {
        self.target_cost = Some(target_cost);
        self
    }

    pub fn with_inertia_factor(mut self, factor: f64) -> Self {
        self.inertia_factor = Some(factor);
        self
    }

    pub fn with_cognitive_factor(mut self, factor: f64) -> Self {
        self.cognitive_factor = Some(factor);
        self
    }

    pub fn with_social_factor(mut self, factor: f64) -> Self {
        self.social_factor = Some(factor);
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

/// Which solver to run, with its configuration.
#[derive(Debug, Clone)]
pub enum OptimizerMethod {
    /// Nelder-Mead simplex (gradient-free, local). The workhorse for these
    /// models.
    NelderMead(NelderMeadConfig),

    /// Particle Swarm (gradient-free, global). Needs finite bounds on every
    /// parameter.
    ParticleSwarm(ParticleSwarmConfig),
}

impl Default for OptimizerMethod {
    fn default() -> Self {
        OptimizerMethod::NelderMead(NelderMeadConfig::default())
    }
}

impl OptimizerMethod {
    pub fn name(&self) -> &'static str {
        match self {
            OptimizerMethod::NelderMead(_) => "Nelder-Mead",
            OptimizerMethod::ParticleSwarm(_) => "Particle Swarm",
        }
    }
}

/// Raw solver outcome, before the fit layer attaches residuals and timing.
#[derive(Debug, Clone)]
pub struct SolverRun {
    pub best_parameters: Vec<f64>,
    pub final_cost: f64,
    pub iterations: usize,
    pub converged: bool,
    pub termination_reason: String,
}

/// Run a solver on a calibration problem. The best point found is always
/// reported; hitting the iteration cap is not an error.
pub fn optimize(
    problem: CalibrationProblem,
    method: &OptimizerMethod,
) -> Result<SolverRun, CalibrationError> {
    let initial_params = problem.initial_parameters();

    match method {
        OptimizerMethod::NelderMead(config) => {
            optimize_nelder_mead(problem, initial_params, config)
        }
        OptimizerMethod::ParticleSwarm(config) => {
            optimize_particle_swarm(problem, initial_params, config)
        }
    }
}

fn optimize_nelder_mead(
    problem: CalibrationProblem,
    initial_params: Vec<f64>,
    config: &NelderMeadConfig,
) -> Result<SolverRun, CalibrationError> {
    // Simplex of n+1 vertices: the initial guess plus one 10% perturbation
    // per parameter.
    let n = initial_params.len();
    let mut vertices = vec![initial_params.clone()];
    for i in 0..n {
        let mut vertex = initial_params.clone();
        vertex[i] *= 1.1;
        vertices.push(vertex);
    }

    let mut solver = NelderMead::new(vertices)
        .with_sd_tolerance(config.sd_tolerance)
        .map_err(|e| CalibrationError::Solver(format!("failed to set sd_tolerance: {e}")))?;

    if let Some(alpha) = config.alpha {
        solver = solver
            .with_alpha(alpha)
            .map_err(|e| CalibrationError::Solver(format!("failed to set alpha: {e}")))?;
    }
    if let Some(gamma) = config.gamma {
        solver = solver
            .with_gamma(gamma)
            .map_err(|e| CalibrationError::Solver(format!("failed to set gamma: {e}")))?;
    }
    if let Some(rho) = config.rho {
        solver = solver
            .with_rho(rho)
            .map_err(|e| CalibrationError::Solver(format!("failed to set rho: {e}")))?;
    }
    if let Some(sigma) = config.sigma {
        solver = solver
            .with_sigma(sigma)
            .map_err(|e| CalibrationError::Solver(format!("failed to set sigma: {e}")))?;
    }

    let executor =
        Executor::new(problem, solver).configure(|state| state.max_iters(config.max_iterations));

    let result = if config.verbose {
        use argmin::core::observers::ObserverMode;
        use argmin_observer_slog::SlogLogger;

        info!(
            "Nelder-Mead: {} parameters, max {} iterations, sd tolerance {}",
            n, config.max_iterations, config.sd_tolerance
        );
        executor
            .add_observer(SlogLogger::term(), ObserverMode::Always)
            .run()
            .map_err(|e| CalibrationError::Solver(e.to_string()))?
    } else {
        executor
            .run()
            .map_err(|e| CalibrationError::Solver(e.to_string()))?
    };

    let state = result.state();

    Ok(SolverRun {
        best_parameters: state.best_param.clone().unwrap_or(initial_params),
        final_cost: state.best_cost,
        iterations: state.iter as usize,
        converged: state.termination_status.terminated(),
        termination_reason: format!("{:?}", state.termination_status),
    })
}

fn optimize_particle_swarm(
    problem: CalibrationProblem,
    initial_params: Vec<f64>,
    config: &ParticleSwarmConfig,
) -> Result<SolverRun, CalibrationError> {
    let bounds = problem.parameter_bounds();
    let names = problem.parameter_names();
    for ((min, max), name) in bounds.iter().zip(&names) {
        if !min.is_finite() || !max.is_finite() {
            return Err(CalibrationError::InvalidBounds { name: name.clone() });
        }
    }
    let lower_bound: Vec<f64> = bounds.iter().map(|(min, _)| *min).collect();
    let upper_bound: Vec<f64> = bounds.iter().map(|(_, max)| *max).collect();

    let mut solver = ParticleSwarm::new((lower_bound, upper_bound), config.num_particles);

    if let Some(inertia) = config.inertia_factor {
        solver = solver
            .with_inertia_factor(inertia)
            .map_err(|e| CalibrationError::Solver(format!("failed to set inertia_factor: {e}")))?;
    }
    if let Some(cognitive) = config.cognitive_factor {
        solver = solver.with_cognitive_factor(cognitive).map_err(|e| {
            CalibrationError::Solver(format!("failed to set cognitive_factor: {e}"))
        })?;
    }
    if let Some(social) = config.social_factor {
        solver = solver
            .with_social_factor(social)
            .map_err(|e| CalibrationError::Solver(format!("failed to set social_factor: {e}")))?;
    }

    let executor = Executor::new(problem, solver).configure(|state| {
        let mut state = state.max_iters(config.max_iterations);
        if let Some(target) = config.target_cost {
            state = state.target_cost(target);
        }
        state
    });

    let result = if config.verbose {
        use argmin::core::observers::ObserverMode;
        use argmin_observer_slog::SlogLogger;

        info!(
            "Particle Swarm: {} particles, max {} iterations",
            config.num_particles, config.max_iterations
        );
        executor
            .add_observer(SlogLogger::term(), ObserverMode::Always)
            .run()
            .map_err(|e| CalibrationError::Solver(e.to_string()))?
    } else {
        executor
            .run()
            .map_err(|e| CalibrationError::Solver(e.to_string()))?
    };

    let state = result.state();

    // ParticleSwarm carries its best point in the population state.
    let (best_parameters, final_cost) = match &state.best_individual {
        Some(particle) => (particle.position.clone(), particle.cost),
        None => (initial_params, f64::INFINITY),
    };

    Ok(SolverRun {
        best_parameters,
        final_cost,
        iterations: state.iter as usize,
        converged: state.termination_status.terminated(),
        termination_reason: format!("{:?}", state.termination_status),
    })
}
