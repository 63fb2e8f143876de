//! Plain-text rendering of an audit report

use crate::types::{AuditReport, CarbonUnit};

/// Shown when no rule matched the facility
pub const NO_RULE_TRIGGERED: &str =
    "No rule triggered. Keep monitoring and maintain current best practices.";

fn unit_label(unit: CarbonUnit) -> &'static str {
    match unit {
        CarbonUnit::Kg => "kg CO2",
        CarbonUnit::Tonnes => "t CO2",
    }
}

/// Render a report for terminal output.
///
/// Sections: KPIs, Recommendations, Scenario, and Forecast (when present).
pub fn render_text(report: &AuditReport) -> String {
    let mut sections = Vec::new();
    let m = &report.metrics;
    let s = &report.scenario;
    let unit = unit_label(s.co2_unit);

    // 1. KPIs
    let title = report.facility.as_deref().unwrap_or("Facility");
    sections.push(format!(
        "== {title} ==\n\
         PUE: {:.2} | DCiE: {:.1}% | CO2: {:.0} {unit}/yr",
        m.pue, m.dcie, m.co2_annual,
    ));

    // 2. Recommendations
    let mut lines = vec!["Recommendations:".to_string()];
    if s.recommendations.is_empty() {
        lines.push(NO_RULE_TRIGGERED.to_string());
    } else {
        for rec in &s.recommendations {
            lines.push(format!(
                "- {} (~{}%): {}",
                rec.action, rec.saving_percent, rec.justification
            ));
        }
    }
    sections.push(lines.join("\n"));

    // 3. Scenario
    sections.push(format!(
        "Scenario:\n\
         Total estimated saving: {}% (target {}%)\n\
         CO2 before: {:.0} {unit}/yr\n\
         CO2 after:  {:.0} {unit}/yr (avoided {:.0})\n\
         Status: {}",
        s.total_saving_percent,
        s.target_percent,
        s.before_co2,
        s.after_co2,
        s.co2_avoided,
        s.status,
    ));

    // 4. Forecast
    if let Some(ref f) = s.forecast {
        sections.push(format!(
            "Forecast ({} model, {} audits, R² {:.2}): ~{:.1}% CO2 reduction",
            f.model, f.training_samples, f.fit_r_squared, f.predicted_co2_reduction_percent,
        ));
    }

    sections.join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        Co2Impact, FacilityInput, Forecast, Metrics, ModelKind, Recommendation, ScenarioResult,
        ScenarioStatus,
    };
    use chrono::Utc;

    fn report(recommendations: Vec<Recommendation>, forecast: Option<Forecast>) -> AuditReport {
        let total: f64 = recommendations.iter().map(|r| r.saving_percent).sum();
        AuditReport {
            facility: Some("DC-Lyon-1".to_string()),
            input: FacilityInput {
                name: Some("DC-Lyon-1".to_string()),
                it_energy: 780_000.0,
                total_energy: 1_300_000.0,
                cpu_utilization: 18.0,
                cooling_ratio: 65.0,
                carbon_factor: 0.30,
                cooling_setpoint: 24.0,
                aisle_containment: true,
                virtualization_level: None,
                carbon_unit: CarbonUnit::Kg,
            },
            metrics: Metrics {
                pue: 1.6667,
                dcie: 60.0,
                co2_annual: 390_000.0,
                co2_unit: CarbonUnit::Kg,
                total_energy: 1_300_000.0,
            },
            scenario: ScenarioResult {
                recommendations,
                total_saving_percent: total,
                target_percent: 25.0,
                status: if total >= 25.0 {
                    ScenarioStatus::TargetAchieved
                } else {
                    ScenarioStatus::AdditionalActionsRequired
                },
                before_co2: 390_000.0,
                after_co2: 390_000.0 * (1.0 - total / 100.0),
                co2_avoided: 390_000.0 * total / 100.0,
                co2_unit: CarbonUnit::Kg,
                before_energy: 1_300_000.0,
                after_energy: 1_300_000.0 * (1.0 - total / 100.0),
                forecast,
            },
            generated_at: Utc::now(),
        }
    }

    #[test]
    fn test_recommendation_lines() {
        let rec = Recommendation {
            rule_id: "CPU_LOW".to_string(),
            action: "Server consolidation".to_string(),
            saving_percent: 15.0,
            co2_impact: Co2Impact::High,
            justification: "Idle servers waste power".to_string(),
            trigger: "cpu_utilization = 18.0 < 20".to_string(),
        };
        let text = render_text(&report(vec![rec], None));
        assert!(text.contains("PUE: 1.67 | DCiE: 60.0% | CO2: 390000 kg CO2/yr"));
        assert!(text.contains("- Server consolidation (~15%): Idle servers waste power"));
        assert!(text.contains("ADDITIONAL ACTIONS REQUIRED"));
        assert!(!text.contains("Forecast"));
    }

    #[test]
    fn test_no_rule_triggered() {
        let text = render_text(&report(Vec::new(), None));
        assert!(text.contains(NO_RULE_TRIGGERED));
        assert!(text.contains("Total estimated saving: 0% (target 25%)"));
    }

    #[test]
    fn test_forecast_section() {
        let f = Forecast {
            predicted_co2_reduction_percent: 21.4,
            model: ModelKind::Tree,
            training_samples: 12,
            fit_r_squared: 0.81,
        };
        let text = render_text(&report(Vec::new(), Some(f)));
        assert!(text.contains("Forecast (tree model, 12 audits, R² 0.81): ~21.4% CO2 reduction"));
    }
}
