use crate::{Access, EnumOption, ParameterKind, ParameterSpec, ValueError};
use std::collections::HashSet;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TableError {
    #[error("Parameter table is empty")]
    Empty,

    #[error("Duplicate parameter name: {0}")]
    DuplicateName(String),

    #[error("Parameters {0} and {1} share a register address")]
    DuplicateRegister(String, String),

    #[error("Parameter {0} has an empty or inverted range")]
    InvalidRange(String),

    #[error("Default value of {0} is not valid for its own range")]
    InvalidDefault(String),
}

/// A closed, statically declared set of parameters. Iteration order is declaration order, which
/// is also the order a full refresh reads them in.
#[derive(Copy, Clone, Debug)]
pub struct ParameterTable {
    specs: &'static [ParameterSpec],
}

impl ParameterTable {
    pub fn new(specs: &'static [ParameterSpec]) -> Result<Self, TableError> {
        Self::check(specs)?;
        Ok(Self { specs })
    }

    /// The parameter map of the XVF-3000 firmware shipped on the ReSpeaker USB Mic Array v2.0.
    pub fn respeaker_v2() -> Self {
        debug_assert!(Self::check(RESPEAKER_V2).is_ok());
        Self {
            specs: RESPEAKER_V2,
        }
    }

    fn check(specs: &[ParameterSpec]) -> Result<(), TableError> {
        if specs.is_empty() {
            return Err(TableError::Empty);
        }

        let mut names = HashSet::new();
        for spec in specs {
            if !names.insert(spec.name) {
                return Err(TableError::DuplicateName(spec.name.to_string()));
            }

            let range_ok = match spec.kind {
                ParameterKind::Boolean => true,
                ParameterKind::Integer { min, max } => min <= max,
                ParameterKind::Float { min, max } => min.is_finite() && max.is_finite() && min <= max,
                ParameterKind::Enum { options } => !options.is_empty(),
            };
            if !range_ok {
                return Err(TableError::InvalidRange(spec.name.to_string()));
            }

            if spec.validate(spec.default) != Ok(spec.default) {
                return Err(TableError::InvalidDefault(spec.name.to_string()));
            }
        }

        for (index, spec) in specs.iter().enumerate() {
            if let Some(other) = specs[index + 1..]
                .iter()
                .find(|other| other.register == spec.register)
            {
                return Err(TableError::DuplicateRegister(
                    spec.name.to_string(),
                    other.name.to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Finds a parameter by name, or by the firmware's own (upper case) key.
    pub fn lookup(&self, name: &str) -> Result<&'static ParameterSpec, ValueError> {
        let specs: &'static [ParameterSpec] = self.specs;
        specs
            .iter()
            .find(|spec| spec.name == name)
            .or_else(|| {
                specs
                    .iter()
                    .find(|spec| spec.vendor_name.eq_ignore_ascii_case(name))
            })
            .ok_or_else(|| ValueError::UnknownParameter(name.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &'static ParameterSpec> {
        let specs: &'static [ParameterSpec] = self.specs;
        specs.iter()
    }

    pub fn writable(&self) -> impl Iterator<Item = &'static ParameterSpec> {
        self.iter().filter(|spec| spec.is_writable())
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// The parameter that is read to prove a freshly opened device is answering.
    pub fn first(&self) -> &'static ParameterSpec {
        let specs: &'static [ParameterSpec] = self.specs;
        &specs[0]
    }
}

impl Default for ParameterTable {
    fn default() -> Self {
        Self::respeaker_v2()
    }
}

const HPF_OPTIONS: &[EnumOption] = &[
    EnumOption { code: 0, label: "off" },
    EnumOption { code: 1, label: "70hz" },
    EnumOption { code: 2, label: "125hz" },
    EnumOption { code: 3, label: "180hz" },
];

const NLAEC_OPTIONS: &[EnumOption] = &[
    EnumOption { code: 0, label: "off" },
    EnumOption { code: 1, label: "phase1" },
    EnumOption { code: 2, label: "phase2" },
];

use Access::{ReadOnly, ReadWrite};

#[rustfmt::skip]
pub static RESPEAKER_V2: &[ParameterSpec] = &[
    // Resource 18: Adaptive Echo Canceler
    ParameterSpec::flag("aec_freeze", "AECFREEZEONOFF", 18, 7, ReadWrite, "Adaptive Echo Canceler updates inhibit (off = adaptation enabled, on = freeze adaptation)"),
    ParameterSpec::float("aec_norm", "AECNORM", 18, 19, 0.25, 16.0, 0.25, ReadWrite, "Limit on norm of AEC filter coefficients"),
    ParameterSpec::flag("aec_path_change", "AECPATHCHANGE", 18, 25, ReadOnly, "AEC path change detection"),
    ParameterSpec::float("rt60", "RT60", 18, 26, 0.25, 0.9, 0.25, ReadOnly, "Current RT60 estimate in seconds"),
    ParameterSpec::choice("hpf_mode", "HPFONOFF", 18, 27, HPF_OPTIONS, "High-pass filter on microphone signals"),
    ParameterSpec::flag("rt60_estimation", "RT60ONOFF", 18, 28, ReadWrite, "RT60 estimation for AES"),
    ParameterSpec::float("aec_silence_level", "AECSILENCELEVEL", 18, 30, 1e-9, 1.0, 1e-9, ReadWrite, "Threshold for signal detection in AEC [-inf..0] dBov"),
    ParameterSpec::flag("aec_silence_mode", "AECSILENCEMODE", 18, 31, ReadOnly, "AEC far-end silence detection status"),

    // Resource 19: AGC, noise suppression, echo suppression and voice activity
    ParameterSpec::flag("agc_enabled", "AGCONOFF", 19, 0, ReadWrite, "Automatic Gain Control"),
    ParameterSpec::float("agc_max_gain", "AGCMAXGAIN", 19, 1, 1.0, 1000.0, 1.0, ReadWrite, "Maximum AGC gain factor [0..60] dB"),
    ParameterSpec::float("agc_desired_level", "AGCDESIREDLEVEL", 19, 2, 1e-8, 0.99, 1e-8, ReadWrite, "Target power level of the output signal [-inf..0] dBov"),
    ParameterSpec::float("agc_gain", "AGCGAIN", 19, 3, 1.0, 1000.0, 1.0, ReadWrite, "Current AGC gain factor [0..60] dB"),
    ParameterSpec::float("agc_time_constant", "AGCTIME", 19, 4, 0.1, 1.0, 0.1, ReadWrite, "AGC ramp up / down time constant in seconds"),
    ParameterSpec::flag("comfort_noise", "CNIONOFF", 19, 5, ReadWrite, "Comfort Noise Insertion"),
    ParameterSpec::flag("beamformer_freeze", "FREEZEONOFF", 19, 6, ReadWrite, "Adaptive beamformer updates (off = enabled, on = freeze)"),
    ParameterSpec::flag("stationary_noise_suppression", "STATNOISEONOFF", 19, 8, ReadWrite, "Stationary noise suppression"),
    ParameterSpec::float("gamma_ns", "GAMMA_NS", 19, 9, 0.0, 3.0, 0.0, ReadWrite, "Over-subtraction factor of stationary noise"),
    ParameterSpec::float("min_ns", "MIN_NS", 19, 10, 0.0, 1.0, 0.0, ReadWrite, "Gain-floor for stationary noise suppression [-inf..0] dB"),
    ParameterSpec::flag("non_stationary_noise_suppression", "NONSTATNOISEONOFF", 19, 11, ReadWrite, "Non-stationary noise suppression"),
    ParameterSpec::float("gamma_nn", "GAMMA_NN", 19, 12, 0.0, 3.0, 0.0, ReadWrite, "Over-subtraction factor of non-stationary noise"),
    ParameterSpec::float("min_nn", "MIN_NN", 19, 13, 0.0, 1.0, 0.0, ReadWrite, "Gain-floor for non-stationary noise suppression [-inf..0] dB"),
    ParameterSpec::flag("echo_suppression", "ECHOONOFF", 19, 14, ReadWrite, "Echo suppression"),
    ParameterSpec::float("gamma_e", "GAMMA_E", 19, 15, 0.0, 3.0, 0.0, ReadWrite, "Over-subtraction factor of echo (direct and early components)"),
    ParameterSpec::float("gamma_e_tail", "GAMMA_ETAIL", 19, 16, 0.0, 3.0, 0.0, ReadWrite, "Over-subtraction factor of echo (tail components)"),
    ParameterSpec::float("gamma_enl", "GAMMA_ENL", 19, 17, 0.0, 5.0, 0.0, ReadWrite, "Over-subtraction factor of non-linear echo"),
    ParameterSpec::flag("non_linear_echo_attenuation", "NLATTENONOFF", 19, 18, ReadWrite, "Non-linear echo attenuation"),
    ParameterSpec::choice("nlaec_mode", "NLAEC_MODE", 19, 20, NLAEC_OPTIONS, "Non-linear AEC training mode"),
    ParameterSpec::flag("speech_detected", "SPEECHDETECTED", 19, 22, ReadOnly, "Speech detection status"),
    ParameterSpec::flag("fsb_updated", "FSBUPDATED", 19, 23, ReadOnly, "FSB update decision"),
    ParameterSpec::flag("fsb_path_change", "FSBPATHCHANGE", 19, 24, ReadOnly, "FSB path change detection"),
    ParameterSpec::flag("transient_echo_suppression", "TRANSIENTONOFF", 19, 29, ReadWrite, "Transient echo suppression"),
    ParameterSpec::flag("voice_activity", "VOICEACTIVITY", 19, 32, ReadOnly, "VAD voice activity status"),
    ParameterSpec::flag("stationary_noise_suppression_asr", "STATNOISEONOFF_SR", 19, 33, ReadWrite, "Stationary noise suppression for ASR"),
    ParameterSpec::flag("non_stationary_noise_suppression_asr", "NONSTATNOISEONOFF_SR", 19, 34, ReadWrite, "Non-stationary noise suppression for ASR"),
    ParameterSpec::float("gamma_ns_asr", "GAMMA_NS_SR", 19, 35, 0.0, 3.0, 0.0, ReadWrite, "Over-subtraction factor of stationary noise for ASR"),
    ParameterSpec::float("gamma_nn_asr", "GAMMA_NN_SR", 19, 36, 0.0, 3.0, 0.0, ReadWrite, "Over-subtraction factor of non-stationary noise for ASR"),
    ParameterSpec::float("min_ns_asr", "MIN_NS_SR", 19, 37, 0.0, 1.0, 0.0, ReadWrite, "Gain-floor for stationary noise suppression for ASR [-inf..0] dB"),
    ParameterSpec::float("min_nn_asr", "MIN_NN_SR", 19, 38, 0.0, 1.0, 0.0, ReadWrite, "Gain-floor for non-stationary noise suppression for ASR [-inf..0] dB"),
    ParameterSpec::float("gamma_vad_asr", "GAMMAVAD_SR", 19, 39, 0.0, 1000.0, 0.0, ReadWrite, "Threshold for voice activity detection [-inf..60] dB"),

    // Resource 21: Direction of Arrival
    ParameterSpec::integer("doa_angle", "DOAANGLE", 21, 0, 0, 359, 0, ReadOnly, "Current direction of arrival angle in degrees"),
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ParameterValue;

    static SCENARIO: &[ParameterSpec] = &[
        ParameterSpec::integer("mic_gain", "MICGAIN", 19, 3, 0, 64, 0, ReadWrite, "Microphone gain"),
        ParameterSpec::flag("voice_activity", "VOICEACTIVITY", 19, 32, ReadOnly, ""),
    ];

    static DUPLICATE_NAME: &[ParameterSpec] = &[
        ParameterSpec::flag("agc", "AGCONOFF", 19, 0, ReadWrite, ""),
        ParameterSpec::flag("agc", "OTHER", 19, 1, ReadWrite, ""),
    ];

    static DUPLICATE_REGISTER: &[ParameterSpec] = &[
        ParameterSpec::flag("agc", "AGCONOFF", 19, 0, ReadWrite, ""),
        ParameterSpec::flag("cni", "CNIONOFF", 19, 0, ReadWrite, ""),
    ];

    static INVERTED: &[ParameterSpec] = &[ParameterSpec::integer(
        "backwards", "BACKWARDS", 1, 1, 10, 0, 5, ReadWrite, "",
    )];

    static BAD_DEFAULT: &[ParameterSpec] = &[ParameterSpec::float(
        "norm", "NORM", 1, 1, 0.25, 16.0, 0.0, ReadWrite, "",
    )];

    #[test]
    fn shipped_table_is_valid() {
        let table = ParameterTable::new(RESPEAKER_V2).unwrap();
        assert_eq!(table.len(), 40);
        assert_eq!(table.first().name, "aec_freeze");
        assert_eq!(table.writable().count(), 32);
    }

    #[test]
    fn rejects_broken_tables() {
        assert_eq!(ParameterTable::new(&[]).unwrap_err(), TableError::Empty);
        assert_eq!(
            ParameterTable::new(DUPLICATE_NAME).unwrap_err(),
            TableError::DuplicateName("agc".into())
        );
        assert_eq!(
            ParameterTable::new(DUPLICATE_REGISTER).unwrap_err(),
            TableError::DuplicateRegister("agc".into(), "cni".into())
        );
        assert_eq!(
            ParameterTable::new(INVERTED).unwrap_err(),
            TableError::InvalidRange("backwards".into())
        );
        assert_eq!(
            ParameterTable::new(BAD_DEFAULT).unwrap_err(),
            TableError::InvalidDefault("norm".into())
        );
    }

    #[test]
    fn lookup_by_name_or_vendor_key() {
        let table = ParameterTable::respeaker_v2();
        assert_eq!(table.lookup("agc_gain").unwrap().vendor_name, "AGCGAIN");
        assert_eq!(table.lookup("agcgain").unwrap().name, "agc_gain");
        assert_eq!(
            table.lookup("mic_gain").unwrap_err(),
            ValueError::UnknownParameter("mic_gain".into())
        );

        let scenario = ParameterTable::new(SCENARIO).unwrap();
        assert_eq!(
            scenario.lookup("mic_gain").unwrap().kind,
            ParameterKind::Integer { min: 0, max: 64 }
        );
    }

    #[test]
    fn iteration_follows_declaration_order() {
        let names: Vec<&str> = ParameterTable::new(SCENARIO)
            .unwrap()
            .iter()
            .map(|spec| spec.name)
            .collect();
        assert_eq!(names, vec!["mic_gain", "voice_activity"]);
    }

    #[test]
    fn raw_values_follow_kind() {
        let table = ParameterTable::respeaker_v2();
        let agc = table.lookup("agc_enabled").unwrap();
        assert_eq!(agc.value_from_raw(1, 0.0), ParameterValue::Boolean(true));

        let norm = table.lookup("aec_norm").unwrap();
        assert_eq!(norm.value_from_raw(0, 2.5), ParameterValue::Float(2.5));
    }
}
