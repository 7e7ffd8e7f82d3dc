//! The single conditional transition of the research loop.

use serde::{Deserialize, Serialize};

use crate::state::ResearchState;

/// Where the loop goes after reflection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    /// Run another web-research pass
    Continue,
    /// Write the final report
    Finalize,
}

impl Route {
    pub fn as_str(&self) -> &'static str {
        match self {
            Route::Continue => "continue",
            Route::Finalize => "finalize",
        }
    }
}

/// Decide the next step from `loop_count` alone.
///
/// Returns [`Route::Continue`] while `loop_count <= max_iterations`. The
/// knowledge gap and every other field are ignored.
pub fn route(state: &ResearchState, max_iterations: usize) -> Route {
    if state.loop_count <= max_iterations {
        Route::Continue
    } else {
        Route::Finalize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_with_loops(loop_count: usize) -> ResearchState {
        ResearchState {
            loop_count,
            ..ResearchState::new("t", "r")
        }
    }

    #[test]
    fn test_route_bounds() {
        for max in [2usize, 3] {
            for n in 0..=max {
                assert_eq!(route(&state_with_loops(n), max), Route::Continue, "n={n} max={max}");
            }
            assert_eq!(route(&state_with_loops(max + 1), max), Route::Finalize);
        }
    }

    #[test]
    fn test_knowledge_gap_does_not_shortcut() {
        let mut state = state_with_loops(1);
        state.knowledge_gap = String::new();
        assert_eq!(route(&state, 2), Route::Continue);
        state.knowledge_gap = "Nothing left to learn".to_string();
        assert_eq!(route(&state, 2), Route::Continue);
    }
}
