//! different utility modules used throughout the project
/// terminal and file logging through simplelog
///  Example#1
/// ```rust, ignore
/// use RustedCalculus::Utils::logger::init_logger;
/// // terminal only
/// init_logger("info", false).unwrap();
/// // terminal plus log_<date>_<time>.txt
/// // init_logger("debug", true).unwrap();
/// ```
pub mod logger;
/// parse document with structure like " integration timeout: 30 max_depth: 8 polar ops_threshold: 20" into solver settings
///  Example#1
/// ```rust, ignore
/// use RustedCalculus::Utils::settings::SolverSettings;
/// let settings = SolverSettings::from_document("integration\n timeout: 30\npolar\n ops_threshold: 20").unwrap();
/// let solver = IntegralSolver::with_config(settings.integration.clone());
/// let polar = PolarAreaSolver::with_config(settings.polar.clone());
/// ```
pub mod settings;
