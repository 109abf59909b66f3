//! Ordered, timed application of multi-feature presets.
//!
//! Writing the features of a preset in configuration order can leave a display
//! in an invalid combined state: a sub input selected while picture-by-picture
//! is disabled is rejected, and a stale PBP layout breaks the switch back to a
//! single input. Presets are therefore applied in a fixed order that depends
//! on whether the preset turns PBP off.

use std::fmt;
use std::time::Duration;
use tracing::{debug, info, warn};
use crate::bus::Open;
use crate::config::Preset;
use crate::delay::Sleep;
use crate::enumerate::Device;
use crate::{Ddc, Error, Result};

/// Picture-by-picture mode feature name.
pub const PBP_MODE: &str = "pbp_mode";
/// Primary input feature name.
pub const INPUT_SOURCE: &str = "input_source";
/// Secondary PBP input feature name.
pub const PBP_SUB_INPUT: &str = "pbp_sub_input";
/// USB upstream routing feature name.
pub const USB_SELECTION: &str = "usb_selection";

/// Value label that disables picture-by-picture.
pub const PBP_OFF: &str = "off";

/// Order used when the preset turns PBP off.
pub const SINGLE_INPUT_ORDER: [&str; 3] = [PBP_MODE, INPUT_SOURCE, USB_SELECTION];

/// Order used when entering or staying in PBP, after the reset step.
pub const PBP_ORDER: [&str; 4] = [INPUT_SOURCE, PBP_MODE, PBP_SUB_INPUT, USB_SELECTION];

/// Settle delays after each kind of write.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SettleTimes {
    /// After `pbp_mode` or `input_source`, and after the PBP reset.
    pub slow: Duration,
    /// After any other feature.
    pub fast: Duration,
}

impl Default for SettleTimes {
    fn default() -> Self {
        SettleTimes {
            slow: Duration::from_secs(2),
            fast: Duration::from_secs(1),
        }
    }
}

impl SettleTimes {
    /// Settle delay after writing `feature`.
    pub fn after(&self, feature: &str) -> Duration {
        if feature == PBP_MODE || feature == INPUT_SOURCE {
            self.slow
        } else {
            self.fast
        }
    }
}

/// One planned write.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Step {
    /// Feature name.
    pub feature: String,
    /// Value label.
    pub label: String,
    /// Pause after the write, whether or not it succeeded.
    pub settle: Duration,
    /// Whether this is the implicit PBP reset rather than a preset entry.
    pub reset: bool,
}

/// The outcome of one step.
#[derive(Debug)]
pub struct StepOutcome {
    /// The step that was attempted.
    pub step: Step,
    /// The write result.
    pub result: Result<()>,
}

/// Outcomes of every attempted step, in order.
#[derive(Debug, Default)]
pub struct Report {
    /// Outcomes in the order the steps ran.
    pub steps: Vec<StepOutcome>,
}

impl Report {
    /// Whether every step succeeded.
    pub fn is_success(&self) -> bool {
        self.steps.iter().all(|s| s.result.is_ok())
    }

    /// Steps that failed.
    pub fn failures(&self) -> impl Iterator<Item=&StepOutcome> {
        self.steps.iter().filter(|s| s.result.is_err())
    }

    /// Feature names in the order they were written.
    pub fn features(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.step.feature.as_str()).collect()
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let failed = self.failures().count();
        write!(f, "{} of {} steps applied", self.steps.len() - failed, self.steps.len())
    }
}

/// Applies presets in a hardware-safe order.
#[derive(Copy, Clone, Debug, Default)]
pub struct Sequencer {
    settle: SettleTimes,
}

impl Sequencer {
    /// A sequencer with the given settle delays.
    pub fn new(settle: SettleTimes) -> Self {
        Sequencer {
            settle: settle,
        }
    }

    /// Plan the writes for `preset`.
    ///
    /// Presets that turn PBP off write `pbp_mode` first. All others start
    /// with an unconditional `pbp_mode = off` reset, then set the primary
    /// input before re-enabling PBP and choosing the sub input. Features the
    /// preset does not mention are skipped.
    pub fn plan(&self, preset: &Preset) -> Vec<Step> {
        let leaving_pbp = preset.get(PBP_MODE)
            .map(|label| label.eq_ignore_ascii_case(PBP_OFF))
            .unwrap_or(false);

        let mut steps = Vec::new();
        let order: &[&str] = if leaving_pbp {
            &SINGLE_INPUT_ORDER
        } else {
            steps.push(Step {
                feature: PBP_MODE.into(),
                label: PBP_OFF.into(),
                settle: self.settle.slow,
                reset: true,
            });
            &PBP_ORDER
        };

        steps.extend(order.iter().filter_map(|&feature| preset.get(feature).map(|label| Step {
            feature: feature.into(),
            label: label.clone(),
            settle: self.settle.after(feature),
            reset: false,
        })));
        steps
    }

    /// Apply the preset named `name` to `device`.
    ///
    /// Fails without touching the bus if the device has no configuration or
    /// the preset is unknown. Otherwise every planned step is attempted; a
    /// failed step is recorded in the report and the sequence continues.
    pub fn apply<O: Open, S: Sleep>(&self, ddc: &mut Ddc<O, S>, device: &Device, name: &str) -> Result<Report> {
        let config = device.config()?;
        let preset = config.presets.get(name).ok_or_else(|| Error::UnknownPreset {
            preset: name.into(),
            options: config.presets.keys().cloned().collect(),
        })?;

        info!(bus = %device.bus.display(), "applying preset {}", name);
        Ok(self.run(ddc, device, self.plan(preset)))
    }

    /// Run planned steps against `device`.
    pub fn run<O: Open, S: Sleep>(&self, ddc: &mut Ddc<O, S>, device: &Device, steps: Vec<Step>) -> Report {
        let mut report = Report::default();
        for step in steps {
            if step.reset {
                debug!(bus = %device.bus.display(), "resetting PBP before applying preset");
            }
            let result = apply_feature(ddc, device, &step.feature, &step.label);
            if let Err(ref e) = result {
                warn!(bus = %device.bus.display(), "error applying {}: {}", step.feature, e);
            }
            ddc.sleep(step.settle);
            report.steps.push(StepOutcome {
                step: step,
                result: result,
            });
        }
        report
    }
}

/// Resolve `feature = label` against the device configuration and write it.
pub fn apply_feature<O: Open, S: Sleep>(ddc: &mut Ddc<O, S>, device: &Device, feature: &str, label: &str) -> Result<()> {
    let (code, value) = device.config()?.resolve(feature, label)?;
    debug!(bus = %device.bus.display(), "{} = {} (VCP 0x{:02x} = 0x{:04x})", feature, label, code, value);
    ddc.set_vcp(&device.bus, code, value)
}
