// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::recovery::MIN_CWND;
use num_rational::Ratio;
use num_traits::{One, Zero};

/// Smallest adjustment applied when the reactivity parameter has to be
/// forced above the sensitivity parameter
const REACTIVITY_STEP: Ratio<i64> = Ratio::new_raw(1, 1024);

/// Selects how the window increase applied when leaving STABLE is computed
///
/// The two families are equivalent in role: both produce the number of
/// segments added on top of the BDP estimate while probing for bandwidth.
#[derive(Clone, Debug)]
pub enum GainModel {
    /// `gain = max(bdp / inc_factor, MIN_CWND)`
    ///
    /// `inc_factor` doubles on loss during a gain phase and decays by one
    /// each time STABLE is entered from DRAIN, so a lossy path probes
    /// gently and a clean path probes harder over time.
    Factor {
        min_inc_factor: u32,
        max_inc_factor: u32,
    },
    /// Lucas-recurrence gain
    ///
    /// With `α = 1 + reactivity − sensitivity/reactivity` and
    /// `β = sensitivity − α`, the recurrence `gain = α·bdp + β·last_bdp`
    /// grows as `O(reactivity^n)` while the path delivers more each cycle
    /// and settles at `sensitivity·bdp` once it stops.
    Reactive {
        reactivity: Ratio<i64>,
        sensitivity: Ratio<i64>,
        min_gain_cwnd: u32,
    },
}

impl Default for GainModel {
    fn default() -> Self {
        GainModel::Factor {
            min_inc_factor: 2,
            max_inc_factor: 128,
        }
    }
}

impl GainModel {
    /// Clamps the parameters into their legal ranges, reporting adjustments
    pub(super) fn sanitize(&mut self) {
        match self {
            GainModel::Factor {
                min_inc_factor,
                max_inc_factor,
            } => {
                if *min_inc_factor < 1 {
                    tracing::warn!(
                        min_inc_factor = *min_inc_factor,
                        "min_inc_factor must be at least 1"
                    );
                    *min_inc_factor = 1;
                }
                if *max_inc_factor < *min_inc_factor {
                    tracing::warn!(
                        max_inc_factor = *max_inc_factor,
                        min_inc_factor = *min_inc_factor,
                        "max_inc_factor must not be below min_inc_factor"
                    );
                    *max_inc_factor = *min_inc_factor;
                }
            }
            GainModel::Reactive {
                reactivity,
                sensitivity,
                min_gain_cwnd,
            } => {
                if *sensitivity < Ratio::zero() {
                    tracing::warn!("sensitivity must not be negative");
                    *sensitivity = Ratio::zero();
                }
                if *reactivity <= *sensitivity {
                    tracing::warn!("reactivity must be greater than sensitivity");
                    *reactivity = *sensitivity + REACTIVITY_STEP;
                }
                if *min_gain_cwnd < 1 {
                    tracing::warn!(
                        min_gain_cwnd = *min_gain_cwnd,
                        "min_gain_cwnd must be at least 1"
                    );
                    *min_gain_cwnd = 1;
                }
            }
        }
    }
}

/// The gain family chosen at construction, plus its evolving state
#[derive(Clone, Debug)]
pub(super) enum Gain {
    Factor {
        inc_factor: u32,
        min_inc_factor: u32,
        max_inc_factor: u32,
    },
    Reactive {
        gain_cwnd: u32,
        reactivity: Ratio<i64>,
        sensitivity: Ratio<i64>,
        min_gain_cwnd: u32,
    },
}

impl Gain {
    pub fn new(model: GainModel) -> Self {
        match model {
            GainModel::Factor {
                min_inc_factor,
                max_inc_factor,
            } => Gain::Factor {
                inc_factor: min_inc_factor,
                min_inc_factor,
                max_inc_factor,
            },
            GainModel::Reactive {
                reactivity,
                sensitivity,
                min_gain_cwnd,
            } => Gain::Reactive {
                gain_cwnd: min_gain_cwnd,
                reactivity,
                sensitivity,
                min_gain_cwnd,
            },
        }
    }

    /// The number of segments added on top of the BDP estimate while probing
    pub fn increment(&self, bdp: u32) -> u32 {
        match self {
            Gain::Factor { inc_factor, .. } => (bdp / inc_factor).max(MIN_CWND),
            Gain::Reactive { gain_cwnd, .. } => *gain_cwnd,
        }
    }

    /// Called with the measurement produced at each GAIN_2 exit boundary
    pub fn on_bdp_update(&mut self, bdp: u32, last_bdp: u32) {
        if let Gain::Reactive {
            gain_cwnd,
            reactivity,
            sensitivity,
            min_gain_cwnd,
        } = self
        {
            let alpha = Ratio::one() + *reactivity - *sensitivity / *reactivity;
            let beta = *sensitivity - alpha;

            let gain = alpha * bdp as i64 + beta * last_bdp as i64;
            let gain = gain.max(*sensitivity * bdp as i64);

            *gain_cwnd = (gain.to_integer().max(0) as u32).max(*min_gain_cwnd);
        }
    }

    /// Applies the loss reaction, returning whether the controller should
    /// enter recovery
    pub fn on_loss(&mut self) -> bool {
        match self {
            Gain::Factor {
                inc_factor,
                max_inc_factor,
                ..
            } => {
                if *inc_factor < *max_inc_factor {
                    *inc_factor = inc_factor.saturating_mul(2).min(*max_inc_factor);
                    true
                } else {
                    false
                }
            }
            Gain::Reactive { .. } => true,
        }
    }

    /// Called when STABLE is entered from DRAIN; decays the loss reaction
    pub fn on_enter_stable(&mut self) {
        if let Gain::Factor {
            inc_factor,
            min_inc_factor,
            ..
        } = self
        {
            *inc_factor = inc_factor.saturating_sub(1).max(*min_inc_factor);
        }
    }

    /// The current additive-increase factor, if the factor family is in use
    pub fn inc_factor(&self) -> Option<u32> {
        match self {
            Gain::Factor { inc_factor, .. } => Some(*inc_factor),
            Gain::Reactive { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn factor_increment() {
        let gain = Gain::new(GainModel::default());

        // bdp / inc_factor with the default inc_factor of 2
        assert_eq!(50, gain.increment(100));
        // lower-bounded by MIN_CWND for small shares
        assert_eq!(MIN_CWND, gain.increment(5));
    }

    #[test]
    fn factor_doubles_on_loss_up_to_max() {
        let mut gain = Gain::new(GainModel::Factor {
            min_inc_factor: 2,
            max_inc_factor: 8,
        });

        assert!(gain.on_loss());
        assert_eq!(Some(4), gain.inc_factor());
        assert!(gain.on_loss());
        assert_eq!(Some(8), gain.inc_factor());

        // at the maximum the loss is ignored
        assert!(!gain.on_loss());
        assert_eq!(Some(8), gain.inc_factor());
    }

    #[test]
    fn factor_decays_on_stable() {
        let mut gain = Gain::new(GainModel::Factor {
            min_inc_factor: 2,
            max_inc_factor: 8,
        });

        assert!(gain.on_loss());
        assert_eq!(Some(4), gain.inc_factor());

        gain.on_enter_stable();
        assert_eq!(Some(3), gain.inc_factor());
        gain.on_enter_stable();
        gain.on_enter_stable();
        // never decays below the minimum
        assert_eq!(Some(2), gain.inc_factor());
    }

    #[test]
    fn reactive_settles_at_sensitivity() {
        let mut gain = Gain::new(GainModel::Reactive {
            reactivity: Ratio::new(1, 8),
            sensitivity: Ratio::new(1, 64),
            min_gain_cwnd: 4,
        });

        // with bdp == last_bdp the recurrence settles at sensitivity * bdp
        gain.on_bdp_update(6400, 6400);
        assert_eq!(100, gain.increment(6400));
    }

    #[test]
    fn reactive_grows_with_bdp() {
        let mut gain = Gain::new(GainModel::Reactive {
            reactivity: Ratio::new(1, 8),
            sensitivity: Ratio::new(1, 64),
            min_gain_cwnd: 4,
        });

        // a growing bdp produces a gain well above the steady-state value
        gain.on_bdp_update(2000, 1000);
        assert!(gain.increment(2000) > 31);
    }

    #[test]
    fn reactive_floor_is_min_gain_cwnd() {
        let mut gain = Gain::new(GainModel::Reactive {
            reactivity: Ratio::new(1, 8),
            sensitivity: Ratio::new(1, 64),
            min_gain_cwnd: 4,
        });

        gain.on_bdp_update(8, 8);
        assert_eq!(4, gain.increment(8));
    }

    #[test]
    fn sanitize_clamps_invalid_parameters() {
        let mut model = GainModel::Factor {
            min_inc_factor: 0,
            max_inc_factor: 0,
        };
        model.sanitize();
        assert!(matches!(
            model,
            GainModel::Factor {
                min_inc_factor: 1,
                max_inc_factor: 1,
            }
        ));

        let mut model = GainModel::Reactive {
            reactivity: Ratio::new(1, 64),
            sensitivity: Ratio::new(1, 8),
            min_gain_cwnd: 0,
        };
        model.sanitize();
        if let GainModel::Reactive {
            reactivity,
            sensitivity,
            min_gain_cwnd,
        } = model
        {
            assert!(reactivity > sensitivity);
            assert_eq!(1, min_gain_cwnd);
        } else {
            unreachable!();
        }
    }
}
