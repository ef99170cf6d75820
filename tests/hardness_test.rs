// ==========================================
// 硬度预测集成测试
// ==========================================
// 测试目标: 淬火硬度 / 回火软化 / 结果序列化
// ==========================================

mod test_helpers;

use heat_treat_core::domain::TemperingSpec;
use heat_treat_core::engine::{
    hollomon_jaffe_parameter, hv_to_hrc, predict_hardness_profile, HardnessPredictor,
};
use test_helpers::{composition_4340, grade_4340, kinetics_4340, quench_paths};

#[test]
fn test_hollomon_jaffe_reference() {
    // (600 + 273.15) × (20 + log10(1 h))
    let hjp = hollomon_jaffe_parameter(600.0, 60.0, 20.0);
    assert!((hjp - 17_463.0).abs() < 1.0, "HJP={}", hjp);
    assert_eq!(hollomon_jaffe_parameter(600.0, 0.0, 20.0), 0.0);
}

#[test]
fn test_hrc_undefined_below_200_hv() {
    assert_eq!(hv_to_hrc(180.0), None);
    assert!(hv_to_hrc(450.0).is_some());
}

#[test]
fn test_tempering_reference_case() {
    let predictor = HardnessPredictor::new(composition_4340());
    let tempered = predictor.tempered_hardness(550.0, 600.0, 60.0, 20.0);
    assert!(tempered.hv <= 550.0);
    assert!(tempered.hv >= predictor.tempering_floor());
}

#[test]
fn test_tempering_is_monotonic() {
    let predictor = HardnessPredictor::new(composition_4340());
    let temps = [200.0, 300.0, 400.0, 500.0, 600.0, 650.0];
    let values: Vec<f64> = temps
        .iter()
        .map(|t| predictor.tempered_hardness(600.0, *t, 120.0, 20.0).hv)
        .collect();
    assert!(values.windows(2).all(|w| w[1] <= w[0] + 1e-9), "{:?}", values);
}

#[test]
fn test_profile_with_kinetics_and_tempering() {
    let result = predict_hardness_profile(
        &grade_4340(),
        &quench_paths(),
        Some(&kinetics_4340()),
        Some(TemperingSpec::new(600.0, 60.0)),
    )
    .expect("profile");

    assert!(result.is_tempered());
    assert_eq!(result.tempering_temperature, Some(600.0));
    for position in ["surface", "center"] {
        let quenched = result.hardness_hv[position];
        let tempered = result.tempered_hardness_hv[position];
        assert!(tempered <= quenched, "{}: {} > {}", position, tempered, quenched);
        assert_eq!(result.final_hardness_hv(position), Some(tempered));
        let total = result.phase_fractions[position].total();
        assert!((total - 1.0).abs() < 1e-6);
    }
    assert!(result.hardness_hv["surface"] > result.hardness_hv["center"]);
    assert!(result.uts_mpa["surface"] > result.uts_mpa["center"]);
}

#[test]
fn test_untempered_result_serialization() {
    let result = predict_hardness_profile(&grade_4340(), &quench_paths(), None, None)
        .expect("profile");
    assert!(!result.is_tempered());

    let value = result.to_value().expect("serialize");
    assert!(value["hardness_hv"]["surface"].is_number());
    assert!(value["tempering_temperature"].is_null());
    assert!(value["tempering_time"].is_null());
    assert_eq!(value["hollomon_jaffe_parameter"], 0.0);

    // 成分派生指标与成分本身随结果保存
    let composition = composition_4340();
    let ce = value["carbon_equivalent"].as_f64().expect("carbon_equivalent");
    assert!((ce - composition.carbon_equivalent_iiw()).abs() < 1e-3, "CE={}", ce);
    let di = value["ideal_diameter"].as_f64().expect("ideal_diameter");
    assert!((di - composition.ideal_diameter_di()).abs() < 1e-2, "DI={}", di);
    assert_eq!(value["composition"]["C"], 0.40);
    assert_eq!(value["composition"]["Ni"], 1.80);

    // 韧性评级键名
    assert!(value["toughness_rating"]["surface"].is_string());
    assert!(value.get("toughness").is_none());
}
