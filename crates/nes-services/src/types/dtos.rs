/*!
Transport-agnostic Data Transfer Objects (DTOs).

Request parameters arrive as JSON objects with PascalCase keys and are parsed
once into the structs below. Optional model parameters fall back to the model
defaults of `nes-npu-neural`.

Copyright 2025 Neuraville Inc.
Licensed under the Apache License, Version 2.0
*/

use nes_npu_neural::{
    CompartmentId, LIFCNeuronParams, NeuronId, PassiveSomaParams, ShapeId, StdpMethod,
    StdpParams, Vec3D,
};
use nes_npu_sim_engine::SimulationId;
use serde::{Deserialize, Serialize};

use super::errors::{ServiceError, ServiceResult};

fn parse_name<T>(value: &Option<String>, default: T) -> ServiceResult<T>
where
    T: std::str::FromStr<Err = nes_npu_neural::NeuralError>,
{
    match value {
        Some(name) => Ok(name.parse()?),
        None => Ok(default),
    }
}

// ============================================================================
// SIMULATION DTOs
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct SimulationCreateParams {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Seed", default)]
    pub seed: Option<u64>,
}

/// Parameters of routes that only name a simulation
#[derive(Debug, Clone, Deserialize)]
pub struct SimulationIdParams {
    #[serde(rename = "SimulationID")]
    pub simulation_id: SimulationId,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RunForParams {
    #[serde(rename = "SimulationID")]
    pub simulation_id: SimulationId,
    #[serde(rename = "Runtime_ms")]
    pub runtime_ms: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecordAllParams {
    #[serde(rename = "SimulationID")]
    pub simulation_id: SimulationId,
    #[serde(rename = "MaxRecordTime_ms")]
    pub max_record_time_ms: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SetSpecificAPTimesParams {
    #[serde(rename = "SimulationID")]
    pub simulation_id: SimulationId,
    /// `[[t_ms, NeuronID], ...]`
    #[serde(rename = "TimeNeuronPairs")]
    pub time_neuron_pairs: Vec<(f64, NeuronId)>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoadParams {
    #[serde(rename = "SavedSimName")]
    pub saved_sim_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ManTaskStatusParams {
    #[serde(rename = "TaskID")]
    pub task_id: u64,
}

/// Response of `Simulation/GetStatus`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationStatus {
    #[serde(rename = "IsSimulating")]
    pub is_simulating: bool,
    #[serde(rename = "IsRendering")]
    pub is_rendering: bool,
    #[serde(rename = "InSimulationTime_ms")]
    pub in_simulation_time_ms: f64,
}

// ============================================================================
// GEOMETRY AND COMPARTMENT DTOs
// ============================================================================

/// Shapes are anonymous; a `Name` sent by older clients is ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct SphereCreateParams {
    #[serde(rename = "SimulationID")]
    pub simulation_id: SimulationId,
    #[serde(rename = "Center_um")]
    pub center_um: Vec3D,
    #[serde(rename = "Radius_um")]
    pub radius_um: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CylinderCreateParams {
    #[serde(rename = "SimulationID")]
    pub simulation_id: SimulationId,
    #[serde(rename = "Point1Position_um")]
    pub point1_position_um: Vec3D,
    #[serde(rename = "Point1Radius_um")]
    pub point1_radius_um: f64,
    #[serde(rename = "Point2Position_um")]
    pub point2_position_um: Vec3D,
    #[serde(rename = "Point2Radius_um")]
    pub point2_radius_um: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BSCompartmentCreateParams {
    #[serde(rename = "SimulationID")]
    pub simulation_id: SimulationId,
    #[serde(rename = "Name", default)]
    pub name: String,
    #[serde(rename = "ShapeID")]
    pub shape_id: ShapeId,
    #[serde(rename = "MembranePotential_mV")]
    pub membrane_potential_mv: f64,
    #[serde(rename = "SpikeThreshold_mV")]
    pub spike_threshold_mv: f64,
    #[serde(rename = "DecayTime_ms")]
    pub decay_time_ms: f64,
    #[serde(rename = "RestingPotential_mV")]
    pub resting_potential_mv: f64,
    #[serde(rename = "AfterHyperpolarizationAmplitude_mV")]
    pub ahp_amplitude_mv: f64,
}

impl BSCompartmentCreateParams {
    pub fn membrane(&self) -> PassiveSomaParams {
        PassiveSomaParams {
            membrane_potential_mv: self.membrane_potential_mv,
            spike_threshold_mv: self.spike_threshold_mv,
            decay_time_ms: self.decay_time_ms,
            resting_potential_mv: self.resting_potential_mv,
            ahp_amplitude_mv: self.ahp_amplitude_mv,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LIFCCompartmentCreateParams {
    #[serde(rename = "SimulationID")]
    pub simulation_id: SimulationId,
    #[serde(rename = "Name", default)]
    pub name: String,
    #[serde(rename = "ShapeID")]
    pub shape_id: ShapeId,
}

// ============================================================================
// RECEPTOR DTOs
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct ReceptorCreateParams {
    #[serde(rename = "SimulationID")]
    pub simulation_id: SimulationId,
    #[serde(rename = "Name", default)]
    pub name: String,
    #[serde(rename = "SourceCompartmentID")]
    pub source_compartment_id: CompartmentId,
    #[serde(rename = "DestinationCompartmentID")]
    pub destination_compartment_id: CompartmentId,
    #[serde(rename = "Conductance_nS")]
    pub conductance_ns: f64,
    #[serde(rename = "TimeConstantRise_ms")]
    pub tau_rise_ms: f64,
    #[serde(rename = "TimeConstantDecay_ms")]
    pub tau_decay_ms: f64,
    #[serde(rename = "Neurotransmitter")]
    pub neurotransmitter: String,
    #[serde(rename = "ReceptorPosition_um", default)]
    pub position_um: Vec3D,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LIFCReceptorCreateParams {
    #[serde(rename = "SimulationID")]
    pub simulation_id: SimulationId,
    #[serde(rename = "Name", default)]
    pub name: String,
    #[serde(rename = "SourceCompartmentID")]
    pub source_compartment_id: CompartmentId,
    #[serde(rename = "DestinationCompartmentID")]
    pub destination_compartment_id: CompartmentId,
    #[serde(rename = "Neurotransmitter")]
    pub neurotransmitter: String,
    /// Defaults to the neurotransmitter's reversal potential
    #[serde(rename = "ReversalPotential_mV", default)]
    pub reversal_potential_mv: Option<f64>,
    #[serde(rename = "PSPRise_ms")]
    pub psp_rise_ms: f64,
    #[serde(rename = "PSPDecay_ms")]
    pub psp_decay_ms: f64,
    #[serde(rename = "OnsetDelay_ms", default)]
    pub onset_delay_ms: f64,
    #[serde(rename = "PeakConductance_nS")]
    pub peak_conductance_ns: f64,
    #[serde(rename = "Weight", default = "default_weight")]
    pub weight: f64,
    /// Defaults to true for NMDA
    #[serde(rename = "VoltageGated", default)]
    pub voltage_gated: Option<bool>,
    #[serde(rename = "STDP_Method", default)]
    pub stdp_method: Option<String>,
    #[serde(rename = "STDP_A_pos", default)]
    pub stdp_a_pos: Option<f64>,
    #[serde(rename = "STDP_A_neg", default)]
    pub stdp_a_neg: Option<f64>,
    #[serde(rename = "STDP_Tau_pos_ms", default)]
    pub stdp_tau_pos_ms: Option<f64>,
    #[serde(rename = "STDP_Tau_neg_ms", default)]
    pub stdp_tau_neg_ms: Option<f64>,
    #[serde(rename = "ReceptorPosition_um", default)]
    pub position_um: Vec3D,
}

fn default_weight() -> f64 {
    1.0
}

impl LIFCReceptorCreateParams {
    pub fn stdp(&self) -> ServiceResult<StdpParams> {
        let defaults = StdpParams::default();
        Ok(StdpParams {
            method: parse_name::<StdpMethod>(&self.stdp_method, defaults.method)?,
            a_pos: self.stdp_a_pos.unwrap_or(defaults.a_pos),
            a_neg: self.stdp_a_neg.unwrap_or(defaults.a_neg),
            tau_pos_ms: self.stdp_tau_pos_ms.unwrap_or(defaults.tau_pos_ms),
            tau_neg_ms: self.stdp_tau_neg_ms.unwrap_or(defaults.tau_neg_ms),
        })
    }
}

// ============================================================================
// NEURON DTOs
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct BSNeuronCreateParams {
    #[serde(rename = "SimulationID")]
    pub simulation_id: SimulationId,
    #[serde(rename = "Name", default)]
    pub name: String,
    #[serde(rename = "SomaID")]
    pub soma_id: CompartmentId,
    #[serde(rename = "AxonID")]
    pub axon_id: CompartmentId,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SCNeuronCreateParams {
    #[serde(rename = "SimulationID")]
    pub simulation_id: SimulationId,
    #[serde(rename = "Name", default)]
    pub name: String,
    #[serde(rename = "SomaIDs")]
    pub soma_ids: Vec<CompartmentId>,
    #[serde(rename = "DendriteIDs", default)]
    pub dendrite_ids: Vec<CompartmentId>,
    #[serde(rename = "AxonIDs", default)]
    pub axon_ids: Vec<CompartmentId>,
}

/// `Neuron/LIFC/Create`; every model parameter is optional
#[derive(Debug, Clone, Deserialize)]
pub struct LIFCNeuronCreateParams {
    #[serde(rename = "SimulationID")]
    pub simulation_id: SimulationId,
    #[serde(rename = "Name", default)]
    pub name: String,
    #[serde(rename = "CompartmentID")]
    pub compartment_id: CompartmentId,

    #[serde(rename = "RestingPotential_mV", default)]
    pub resting_potential_mv: Option<f64>,
    #[serde(rename = "ResetPotential_mV", default)]
    pub reset_potential_mv: Option<f64>,
    #[serde(rename = "SpikeThreshold_mV", default)]
    pub spike_threshold_mv: Option<f64>,
    #[serde(rename = "MembraneResistance_MOhm", default)]
    pub membrane_resistance_mohm: Option<f64>,
    #[serde(rename = "MembraneCapacitance_pF", default)]
    pub membrane_capacitance_pf: Option<f64>,
    #[serde(rename = "RefractoryPeriod_ms", default)]
    pub refractory_period_ms: Option<f64>,

    #[serde(rename = "AdaptiveThresholdDiffPerSpike", default)]
    pub adaptive_threshold_diff_per_spike: Option<f64>,
    #[serde(rename = "AdaptiveThresholdDiffPotential_mV", default)]
    pub adaptive_threshold_diff_potential_mv: Option<f64>,
    #[serde(rename = "AdaptiveThresholdRecoveryTime_ms", default)]
    pub tau_h_ms: Option<f64>,
    #[serde(rename = "AdaptiveThresholdFloorDeltaPerSpike_mV", default)]
    pub adaptive_threshold_floor_delta_per_spike_mv: Option<f64>,
    #[serde(rename = "AdaptiveThresholdFloorRecoveryTime_ms", default)]
    pub tau_floor_decay_ms: Option<f64>,

    #[serde(rename = "AfterHyperpolarizationAmplitude_nS", default)]
    pub ahp_amplitude_ns: Option<f64>,
    #[serde(rename = "AfterHyperpolarizationDecay_ms", default)]
    pub ahp_decay_ms: Option<f64>,
    #[serde(rename = "AfterHyperpolarizationReversalPotential_mV", default)]
    pub ahp_reversal_potential_mv: Option<f64>,
    #[serde(rename = "AfterHyperpolarizationMax_nS", default)]
    pub ahp_max_ns: Option<f64>,
    #[serde(rename = "AfterHyperpolarizationSaturationModel", default)]
    pub ahp_saturation_model: Option<String>,

    #[serde(rename = "AfterDepolarizationAmplitude_nS", default)]
    pub adp_amplitude_ns: Option<f64>,
    #[serde(rename = "AfterDepolarizationRise_ms", default)]
    pub adp_rise_ms: Option<f64>,
    #[serde(rename = "AfterDepolarizationDecay_ms", default)]
    pub adp_decay_ms: Option<f64>,
    #[serde(rename = "AfterDepolarizationReversalPotential_mV", default)]
    pub adp_reversal_potential_mv: Option<f64>,
    #[serde(rename = "AfterDepolarizationMax_nS", default)]
    pub adp_max_ns: Option<f64>,
    #[serde(rename = "AfterDepolarizationDepletion", default)]
    pub adp_depletion: Option<f64>,
    #[serde(rename = "AfterDepolarizationRecoveryTime_ms", default)]
    pub adp_recovery_ms: Option<f64>,
    #[serde(rename = "AfterDepolarizationSaturationModel", default)]
    pub adp_saturation_model: Option<String>,

    #[serde(rename = "FatigueThreshold", default)]
    pub fatigue_threshold: Option<f64>,
    #[serde(rename = "FatigueRecoveryTime_ms", default)]
    pub fatigue_recovery_ms: Option<f64>,

    #[serde(rename = "SpontaneousActivityMean_ms", default)]
    pub spontaneous_isi_mean_ms: Option<f64>,
    #[serde(rename = "SpontaneousActivityStDev_ms", default)]
    pub spontaneous_isi_stdev_ms: Option<f64>,

    #[serde(rename = "UpdateMethod", default)]
    pub update_method: Option<String>,
    #[serde(rename = "ResetMethod", default)]
    pub reset_method: Option<String>,
}

impl LIFCNeuronCreateParams {
    /// Model parameters with defaults filled in. Unknown method or model
    /// names fail here.
    pub fn model_params(&self) -> ServiceResult<LIFCNeuronParams> {
        let d = LIFCNeuronParams::default();
        Ok(LIFCNeuronParams {
            resting_potential_mv: self.resting_potential_mv.unwrap_or(d.resting_potential_mv),
            reset_potential_mv: self.reset_potential_mv.unwrap_or(d.reset_potential_mv),
            spike_threshold_mv: self.spike_threshold_mv.unwrap_or(d.spike_threshold_mv),
            membrane_resistance_mohm: self
                .membrane_resistance_mohm
                .unwrap_or(d.membrane_resistance_mohm),
            membrane_capacitance_pf: self
                .membrane_capacitance_pf
                .unwrap_or(d.membrane_capacitance_pf),
            refractory_period_ms: self.refractory_period_ms.unwrap_or(d.refractory_period_ms),

            adaptive_threshold_diff_per_spike: self
                .adaptive_threshold_diff_per_spike
                .unwrap_or(d.adaptive_threshold_diff_per_spike),
            adaptive_threshold_diff_potential_mv: self
                .adaptive_threshold_diff_potential_mv
                .unwrap_or(d.adaptive_threshold_diff_potential_mv),
            tau_h_ms: self.tau_h_ms.unwrap_or(d.tau_h_ms),
            adaptive_threshold_floor_delta_per_spike_mv: self
                .adaptive_threshold_floor_delta_per_spike_mv
                .unwrap_or(d.adaptive_threshold_floor_delta_per_spike_mv),
            tau_floor_decay_ms: self.tau_floor_decay_ms.unwrap_or(d.tau_floor_decay_ms),

            ahp_amplitude_ns: self.ahp_amplitude_ns.unwrap_or(d.ahp_amplitude_ns),
            ahp_decay_ms: self.ahp_decay_ms.unwrap_or(d.ahp_decay_ms),
            ahp_reversal_potential_mv: self
                .ahp_reversal_potential_mv
                .unwrap_or(d.ahp_reversal_potential_mv),
            ahp_max_ns: self.ahp_max_ns.unwrap_or(d.ahp_max_ns),
            ahp_saturation_model: parse_name(&self.ahp_saturation_model, d.ahp_saturation_model)?,

            adp_amplitude_ns: self.adp_amplitude_ns.unwrap_or(d.adp_amplitude_ns),
            adp_rise_ms: self.adp_rise_ms.unwrap_or(d.adp_rise_ms),
            adp_decay_ms: self.adp_decay_ms.unwrap_or(d.adp_decay_ms),
            adp_reversal_potential_mv: self
                .adp_reversal_potential_mv
                .unwrap_or(d.adp_reversal_potential_mv),
            adp_max_ns: self.adp_max_ns.unwrap_or(d.adp_max_ns),
            adp_depletion: self.adp_depletion.unwrap_or(d.adp_depletion),
            adp_recovery_ms: self.adp_recovery_ms.unwrap_or(d.adp_recovery_ms),
            adp_saturation_model: parse_name(&self.adp_saturation_model, d.adp_saturation_model)?,

            fatigue_threshold: self.fatigue_threshold.unwrap_or(d.fatigue_threshold),
            fatigue_recovery_ms: self.fatigue_recovery_ms.unwrap_or(d.fatigue_recovery_ms),

            spontaneous_isi_mean_ms: self
                .spontaneous_isi_mean_ms
                .unwrap_or(d.spontaneous_isi_mean_ms),
            spontaneous_isi_stdev_ms: self
                .spontaneous_isi_stdev_ms
                .unwrap_or(d.spontaneous_isi_stdev_ms),

            update_method: parse_name(&self.update_method, d.update_method)?,
            reset_method: parse_name(&self.reset_method, d.reset_method)?,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SetOptoTagsParams {
    #[serde(rename = "SimulationID")]
    pub simulation_id: SimulationId,
    #[serde(rename = "NeuronIDs")]
    pub neuron_ids: Vec<NeuronId>,
    #[serde(rename = "OptoTagged")]
    pub opto_tagged: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConnectomeTargetsParams {
    #[serde(rename = "SimulationID")]
    pub simulation_id: SimulationId,
    #[serde(rename = "NeuronID")]
    pub neuron_id: NeuronId,
}

// ============================================================================
// TOOL DTOs
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct PatchClampDACCreateParams {
    #[serde(rename = "SimulationID")]
    pub simulation_id: SimulationId,
    #[serde(rename = "Name", default)]
    pub name: String,
    #[serde(rename = "DestinationCompartmentID")]
    pub destination_compartment_id: CompartmentId,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PatchClampDACSetOutputListParams {
    #[serde(rename = "SimulationID")]
    pub simulation_id: SimulationId,
    #[serde(rename = "PatchClampDACID")]
    pub dac_id: u32,
    /// `[[t_ms, current_pA], ...]`
    #[serde(rename = "ControlData")]
    pub control_data: Vec<(f64, f64)>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PatchClampADCCreateParams {
    #[serde(rename = "SimulationID")]
    pub simulation_id: SimulationId,
    #[serde(rename = "Name", default)]
    pub name: String,
    #[serde(rename = "SourceCompartmentID")]
    pub source_compartment_id: CompartmentId,
    #[serde(rename = "Timestep_ms")]
    pub timestep_ms: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PatchClampADCSetSampleRateParams {
    #[serde(rename = "SimulationID")]
    pub simulation_id: SimulationId,
    #[serde(rename = "PatchClampADCID")]
    pub adc_id: u32,
    #[serde(rename = "Timestep_ms")]
    pub timestep_ms: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PatchClampADCParams {
    #[serde(rename = "SimulationID")]
    pub simulation_id: SimulationId,
    #[serde(rename = "PatchClampADCID")]
    pub adc_id: u32,
}

/// Response body of `Tool/PatchClampADC/GetRecordedData`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatchClampADCData {
    #[serde(rename = "RecordedData_mV")]
    pub recorded_data_mv: Vec<f64>,
    #[serde(rename = "Timestep_ms")]
    pub timestep_ms: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use nes_npu_neural::{ResetMethod, UpdateMethod};
    use serde_json::json;

    #[test]
    fn test_shape_params_ignore_name() {
        let params: SphereCreateParams = serde_json::from_value(json!({
            "SimulationID": 2,
            "Name": "soma",
            "Center_um": [1.0, 2.0, 3.0],
            "Radius_um": 4.0,
        }))
        .unwrap();
        assert_eq!(params.simulation_id, SimulationId(2));
        assert_eq!(params.center_um, Vec3D::new(1.0, 2.0, 3.0));
        assert_eq!(params.radius_um, 4.0);
    }

    #[test]
    fn test_lifc_neuron_defaults_and_overrides() {
        let params: LIFCNeuronCreateParams = serde_json::from_value(json!({
            "SimulationID": 0,
            "CompartmentID": 1,
            "ResetMethod": "TOVM",
            "SpikeThreshold_mV": -52.5,
        }))
        .unwrap();
        let model = params.model_params().unwrap();
        assert_eq!(model.reset_method, ResetMethod::ToVm);
        assert_eq!(model.update_method, UpdateMethod::Classical);
        assert_eq!(model.spike_threshold_mv, -52.5);
        assert_eq!(
            model.resting_potential_mv,
            LIFCNeuronParams::default().resting_potential_mv
        );
    }

    #[test]
    fn test_unknown_method_name_is_rejected() {
        let params: LIFCNeuronCreateParams = serde_json::from_value(json!({
            "SimulationID": 0,
            "CompartmentID": 0,
            "UpdateMethod": "RK4",
        }))
        .unwrap();
        assert!(matches!(
            params.model_params(),
            Err(ServiceError::InvalidParameters(_))
        ));
    }

    #[test]
    fn test_missing_required_field_fails_to_parse() {
        let parsed: Result<RunForParams, _> =
            serde_json::from_value(json!({ "SimulationID": 0 }));
        assert!(parsed.is_err());
        let parsed: Result<RunForParams, _> =
            serde_json::from_value(json!({ "SimulationID": "zero", "Runtime_ms": 1.0 }));
        assert!(parsed.is_err());
    }

    #[test]
    fn test_time_neuron_pairs_parse_from_nested_arrays() {
        let params: SetSpecificAPTimesParams = serde_json::from_value(json!({
            "SimulationID": 2,
            "TimeNeuronPairs": [[0.0, 0], [12.5, 3]],
        }))
        .unwrap();
        assert_eq!(params.simulation_id, SimulationId(2));
        assert_eq!(params.time_neuron_pairs, vec![(0.0, NeuronId(0)), (12.5, NeuronId(3))]);
    }

    #[test]
    fn test_lifc_receptor_stdp_defaults() {
        let params: LIFCReceptorCreateParams = serde_json::from_value(json!({
            "SimulationID": 0,
            "SourceCompartmentID": 0,
            "DestinationCompartmentID": 1,
            "Neurotransmitter": "AMPA",
            "PSPRise_ms": 0.5,
            "PSPDecay_ms": 3.0,
            "PeakConductance_nS": 2.0,
            "STDP_Method": "HEBBIAN",
        }))
        .unwrap();
        assert_eq!(params.weight, 1.0);
        let stdp = params.stdp().unwrap();
        assert_eq!(stdp.method, StdpMethod::Hebbian);
        assert_eq!(stdp.a_pos, StdpParams::default().a_pos);
    }
}
