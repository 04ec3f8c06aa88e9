//! Simulation-specific error types.
//!
//! Nothing in the core treats a fault as fatal: numeric degeneracy removes
//! the offending entity, dangling references are cleared on re-validation,
//! and resource-limit conditions skip the action.  These types exist for the
//! fallible edges (configuration validation, scenario setup) where a caller
//! wants to know *why* something was rejected.

use std::fmt;

/// Top-level error enum for the starlance simulation core.
#[derive(Debug)]
pub enum SimError {
    /// An entity reference was dereferenced after its referent left the world.
    /// Usually a despawn race between the formation system and a hit system.
    EntityNotFound {
        /// Human-readable description of where the lookup occurred.
        context: &'static str,
    },

    /// A spawn or promotion was requested beyond a configured population cap.
    LimitReached {
        /// What was being spawned.
        what: &'static str,
        /// The cap that blocked it.
        limit: usize,
    },

    /// Configuration constant is outside its safe operating range.
    /// Returned by validation helpers; not triggered at runtime by default.
    UnsafeConstant {
        /// Name of the constant (for logging).
        name: &'static str,
        /// The value that was rejected.
        value: f32,
        /// Human-readable description of the safe range.
        safe_range: &'static str,
    },
}

impl fmt::Display for SimError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimError::EntityNotFound { context } => {
                write!(f, "entity not found during '{}'", context)
            }
            SimError::LimitReached { what, limit } => {
                write!(f, "{} spawn skipped: population cap {} reached", what, limit)
            }
            SimError::UnsafeConstant {
                name,
                value,
                safe_range,
            } => write!(
                f,
                "constant '{}' = {} is outside safe range {}",
                name, value, safe_range
            ),
        }
    }
}

impl std::error::Error for SimError {}

/// Convenience alias: a `Result` using `SimError` as the error type.
pub type SimResult<T> = Result<T, SimError>;

// ── Validation helpers ────────────────────────────────────────────────────────

/// Returns an error if `gravity_const` is outside its validated safe range.
///
/// Values above 5.0 produce runaway capture velocities near planet surfaces.
pub fn validate_gravity_const(value: f32) -> SimResult<()> {
    if value <= 0.0 || value > 5.0 {
        Err(SimError::UnsafeConstant {
            name: "GRAVITY_CONST",
            value,
            safe_range: "(0.0, 5.0]",
        })
    } else {
        Ok(())
    }
}

/// Returns an error if the grid cell size cannot cover the sight range with a
/// 3×3 neighbourhood query.
pub fn validate_grid_cell_size(cell: f32, sight_range: f32) -> SimResult<()> {
    if cell <= 0.0 || cell < sight_range {
        Err(SimError::UnsafeConstant {
            name: "GRID_CELL_SIZE",
            value: cell,
            safe_range: "[SIGHT_RANGE, ∞)",
        })
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gravity_validation_rejects_extremes() {
        assert!(validate_gravity_const(0.9).is_ok());
        assert!(validate_gravity_const(0.0).is_err());
        assert!(validate_gravity_const(25.0).is_err());
    }

    #[test]
    fn grid_validation_requires_cell_covering_sight() {
        assert!(validate_grid_cell_size(2000.0, 2000.0).is_ok());
        assert!(validate_grid_cell_size(500.0, 2000.0).is_err());
    }
}
