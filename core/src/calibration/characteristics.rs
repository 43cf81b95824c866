use serde::{Deserialize, Serialize};
use std::fmt;

use crate::calibration::CalibrationCurve;
use crate::peripheral::{EfuseCalibration, TwoPointTrim};
use crate::prelude::{AdcWidth, Attenuation, Sample, ADC_12_BIT_MAX};

const LIN_COEFF_A_SCALE: u64 = 65_536;
const LIN_COEFF_A_ROUND: u64 = LIN_COEFF_A_SCALE / 2;
const ADC_12_BIT_RES: u64 = 4096;

const TP_LOW_VOLTAGE: u64 = 150;
const TP_HIGH_VOLTAGE: u64 = 850;

// ADC unit 1 gain/offset tables, indexed by attenuation.
const TP_ATTEN_SCALE: [u64; 4] = [65_504, 86_975, 120_389, 224_310];
const TP_ATTEN_OFFSET: [u64; 4] = [0, 1, 27, 54];
const VREF_ATTEN_SCALE: [u64; 4] = [57_431, 76_236, 105_481, 196_602];
const VREF_ATTEN_OFFSET: [u64; 4] = [75, 78, 107, 142];

/// Where the characterization coefficients came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CalibrationSource {
    TwoPoint,
    EfuseVref,
    DefaultVref,
}

impl fmt::Display for CalibrationSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CalibrationSource::TwoPoint => "Two Point Value",
            CalibrationSource::EfuseVref => "eFuse Vref",
            CalibrationSource::DefaultVref => "Default Vref",
        };
        f.write_str(name)
    }
}

/// Linear ADC characteristics: `mv = (coeff_a * raw + 2^15) / 2^16 + coeff_b`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdcCharacteristics {
    pub attenuation: Attenuation,
    pub width: AdcWidth,
    pub coeff_a: u32,
    pub coeff_b: u32,
    pub vref_mv: u32,
    pub source: CalibrationSource,
}

/// Builds characteristics from the best calibration the chip carries:
/// two-point trim, then eFuse Vref, then `default_vref_mv`.
pub fn characterize(
    attenuation: Attenuation,
    width: AdcWidth,
    default_vref_mv: u32,
    efuse: &EfuseCalibration,
) -> AdcCharacteristics {
    let atten = attenuation.table_index();
    let (coeff_a, coeff_b, vref_mv, source) = match (efuse.two_point, efuse.vref_mv) {
        (Some(trim), _) if trim.high_raw > trim.low_raw => {
            let (a, b) = two_point_coefficients(atten, trim);
            (a, b, efuse.vref_mv.unwrap_or(default_vref_mv), CalibrationSource::TwoPoint)
        }
        (_, Some(vref)) => {
            let (a, b) = vref_coefficients(atten, vref);
            (a, b, vref, CalibrationSource::EfuseVref)
        }
        _ => {
            let (a, b) = vref_coefficients(atten, default_vref_mv);
            (a, b, default_vref_mv, CalibrationSource::DefaultVref)
        }
    };

    AdcCharacteristics {
        attenuation,
        width,
        coeff_a,
        coeff_b,
        vref_mv,
        source,
    }
}

fn two_point_coefficients(atten: usize, trim: TwoPointTrim) -> (u32, u32) {
    let delta_x = u64::from(trim.high_raw - trim.low_raw);
    let delta_v = TP_HIGH_VOLTAGE - TP_LOW_VOLTAGE;
    let coeff_a = (delta_v * TP_ATTEN_SCALE[atten] + delta_x / 2) / delta_x;
    let intercept = (delta_v * u64::from(trim.high_raw) + delta_x / 2) / delta_x;
    let coeff_b = (TP_HIGH_VOLTAGE + TP_ATTEN_OFFSET[atten]).saturating_sub(intercept);
    (saturate(coeff_a), saturate(coeff_b))
}

fn vref_coefficients(atten: usize, vref_mv: u32) -> (u32, u32) {
    let coeff_a = u64::from(vref_mv) * VREF_ATTEN_SCALE[atten] / ADC_12_BIT_RES;
    (saturate(coeff_a), saturate(VREF_ATTEN_OFFSET[atten]))
}

fn saturate(value: u64) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}

impl AdcCharacteristics {
    fn scale_to_12_bit(&self, raw: Sample) -> u64 {
        let shifted = u64::from(raw) << (12 - self.width.bits());
        shifted.min(u64::from(ADC_12_BIT_MAX))
    }

    /// Closest raw code for `millivolts`; the inverse of the linear curve,
    /// clamped to the code range of the configured width.
    pub fn raw_for_millivolts(&self, millivolts: u32) -> Sample {
        if self.coeff_a == 0 {
            return 0;
        }
        let above_offset = u64::from(millivolts.saturating_sub(self.coeff_b));
        let scaled = (above_offset * LIN_COEFF_A_SCALE + u64::from(self.coeff_a) / 2)
            / u64::from(self.coeff_a);
        let raw_12 = scaled.min(u64::from(ADC_12_BIT_MAX));
        (raw_12 >> (12 - self.width.bits())) as Sample
    }
}

impl CalibrationCurve for AdcCharacteristics {
    fn raw_to_millivolts(&self, raw: Sample) -> u32 {
        let reading = self.scale_to_12_bit(raw);
        let mv = (u64::from(self.coeff_a) * reading + LIN_COEFF_A_ROUND) / LIN_COEFF_A_SCALE
            + u64::from(self.coeff_b);
        saturate(mv)
    }
}
