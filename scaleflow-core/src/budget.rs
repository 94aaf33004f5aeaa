//! Credit Budget Estimation
//!
//! line_total = count * cost_per_generation(plan, model) * iterations(asset_type)
//!
//! The buffer is 20% of the estimated total (rounded down), and the
//! surplus or shortfall is what remains of the plan's credits after the
//! total and the buffer.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::warn;

use crate::error::{read_json, ToolError};

pub const DEFAULT_PLAN: &str = "starter";
/// Iterations assumed for asset types missing from the table.
pub const DEFAULT_ITERATIONS: u64 = 3;
pub const BUFFER_PERCENT: u64 = 20;

const STARTER_COSTS: &[(&str, u64)] = &[
    ("flux_fast", 375),
    ("flux_dev_lora", 38),
    ("flux_kontext", 50),
    ("minimax_image", 150),
    ("ideogram_v3", 38),
    ("gpt_image_edit", 19),
    ("runway_gen4_image", 25),
    ("mystic", 13),
    ("imagen_4", 25),
    ("topaz_image_upscale", 8),
    ("magnific_upscale", 13),
    ("veo_3_fast", 13),
    ("seedance_v1", 88),
    ("runway_gen4_turbo", 75),
    ("ltx_2_fast", 38),
    ("ltx_2_pro", 25),
    ("kling_2_1", 88),
    ("minimax_hailuo", 63),
    ("wan_vace", 75),
    ("runway_act_two", 38),
    ("topaz_video_upscale", 13),
    ("trellis_3d", 75),
    ("rodin_3d", 38),
    ("hunyuan_3d", 100),
];

const PROFESSIONAL_COSTS: &[(&str, u64)] = &[
    ("flux_fast", 250),
    ("flux_dev_lora", 25),
    ("flux_kontext", 33),
    ("minimax_image", 100),
    ("ideogram_v3", 25),
    ("gpt_image_edit", 13),
    ("runway_gen4_image", 17),
    ("mystic", 8),
    ("imagen_4", 17),
    ("topaz_image_upscale", 5),
    ("magnific_upscale", 8),
    ("veo_3_fast", 8),
    ("veo_3", 333),
    ("seedance_v1", 58),
    ("runway_gen4_turbo", 50),
    ("ltx_2_fast", 25),
    ("ltx_2_pro", 17),
    ("kling_2_1", 58),
    ("minimax_hailuo", 42),
    ("wan_vace", 50),
    ("runway_act_two", 25),
    ("topaz_video_upscale", 8),
    ("trellis_3d", 50),
    ("rodin_3d", 25),
    ("hunyuan_3d", 67),
];

const TEAM_COSTS: &[(&str, u64)] = &[
    ("flux_fast", 225),
    ("flux_dev_lora", 23),
    ("flux_kontext", 30),
    ("minimax_image", 90),
    ("ideogram_v3", 23),
    ("gpt_image_edit", 11),
    ("runway_gen4_image", 15),
    ("mystic", 8),
    ("imagen_4", 15),
    ("topaz_image_upscale", 5),
    ("magnific_upscale", 8),
    ("veo_3_fast", 8),
    ("veo_3", 300),
    ("seedance_v1", 53),
    ("runway_gen4_turbo", 45),
    ("ltx_2_fast", 23),
    ("ltx_2_pro", 15),
    ("kling_2_1", 53),
    ("minimax_hailuo", 38),
    ("wan_vace", 45),
    ("runway_act_two", 23),
    ("topaz_video_upscale", 8),
    ("trellis_3d", 45),
    ("rodin_3d", 23),
    ("hunyuan_3d", 60),
];

const PLAN_CREDITS: &[(&str, u64)] = &[("starter", 1500), ("professional", 4000), ("team", 4500)];

/// Average generations needed to get one usable asset.
const ITERATION_MULTIPLIERS: &[(&str, u64)] = &[
    ("hero_image", 4),
    ("social_static", 2),
    ("video_15sec", 5),
    ("video_30sec", 8),
    ("3d_product", 4),
    ("product_shot", 3),
    ("text_graphic", 2),
    ("upscale", 1),
    ("edit", 2),
];

fn to_map(pairs: &[(&str, u64)]) -> BTreeMap<String, u64> {
    pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

/// Price table: credits per generation by plan and model, monthly credits
/// per plan, and iteration multipliers by asset type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditTable {
    pub costs: BTreeMap<String, BTreeMap<String, u64>>,
    pub plan_credits: BTreeMap<String, u64>,
    #[serde(default)]
    pub iterations: BTreeMap<String, u64>,
}

impl CreditTable {
    pub fn builtin() -> Self {
        let mut costs = BTreeMap::new();
        costs.insert("starter".to_string(), to_map(STARTER_COSTS));
        costs.insert("professional".to_string(), to_map(PROFESSIONAL_COSTS));
        costs.insert("team".to_string(), to_map(TEAM_COSTS));
        Self {
            costs,
            plan_credits: to_map(PLAN_CREDITS),
            iterations: to_map(ITERATION_MULTIPLIERS),
        }
    }

    pub fn load(path: &Path) -> Result<Self, ToolError> {
        read_json("Credit table", path)
    }

    pub fn plans(&self) -> impl Iterator<Item = &str> {
        self.costs.keys().map(String::as_str)
    }

    pub fn iterations_for(&self, asset_type: &str) -> u64 {
        self.iterations
            .get(asset_type)
            .copied()
            .unwrap_or(DEFAULT_ITERATIONS)
    }
}

impl Default for CreditTable {
    fn default() -> Self {
        Self::builtin()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deliverable {
    pub count: u64,
    pub asset_type: String,
    pub model: String,
}

impl Deliverable {
    pub fn new(count: u64, asset_type: &str, model: &str) -> Self {
        Self {
            count,
            asset_type: asset_type.to_string(),
            model: model.to_string(),
        }
    }
}

/// Demo project used when no deliverables file is given.
pub fn example_project() -> Vec<Deliverable> {
    vec![
        Deliverable::new(3, "hero_image", "flux_kontext"),
        Deliverable::new(6, "social_static", "ideogram_v3"),
        Deliverable::new(3, "video_15sec", "kling_2_1"),
        Deliverable::new(1, "3d_product", "trellis_3d"),
        Deliverable::new(6, "upscale", "topaz_image_upscale"),
    ]
}

/// Parse `N x asset_type using model` lines. Blank lines and `#` comments
/// are skipped; anything else that does not fit is an error.
pub fn parse_deliverables(text: &str) -> Result<Vec<Deliverable>, ToolError> {
    let mut deliverables = vec![];

    for (idx, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let malformed = |reason: &str| ToolError::Deliverable {
            line: idx + 1,
            reason: reason.to_string(),
        };

        let (count, rest) = line
            .split_once(" x ")
            .ok_or_else(|| malformed("expected '[count] x [type] using [model]'"))?;
        let (asset_type, model) = rest
            .split_once(" using ")
            .ok_or_else(|| malformed("missing 'using [model]'"))?;
        let count: u64 = count
            .trim()
            .parse()
            .map_err(|_| malformed(&format!("invalid count '{}'", count.trim())))?;

        let (asset_type, model) = (asset_type.trim(), model.trim());
        if asset_type.is_empty() || model.is_empty() {
            return Err(malformed("empty asset type or model"));
        }
        deliverables.push(Deliverable::new(count, asset_type, model));
    }

    Ok(deliverables)
}

pub fn load_deliverables(path: &Path) -> Result<Vec<Deliverable>, ToolError> {
    if !path.is_file() {
        return Err(ToolError::NotFound("Deliverables file", path.to_path_buf()));
    }
    let text = std::fs::read_to_string(path).map_err(|e| ToolError::io(path, e))?;
    parse_deliverables(&text)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetLine {
    pub count: u64,
    pub asset_type: String,
    pub model: String,
    pub cost_per_gen: u64,
    pub iterations: u64,
    pub line_total: u64,
    /// False when the model is missing from the plan's price list; the
    /// line is then costed at zero.
    pub priced: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Budget {
    pub plan: String,
    pub lines: Vec<BudgetLine>,
    pub total: u64,
    pub buffer: u64,
    pub total_with_buffer: u64,
    pub available: u64,
    pub surplus_or_shortfall: i64,
}

pub fn calculate(
    deliverables: &[Deliverable],
    plan: &str,
    table: &CreditTable,
) -> Result<Budget, ToolError> {
    let costs = table
        .costs
        .get(plan)
        .ok_or_else(|| ToolError::UnknownPlan(plan.to_string()))?;
    let available = *table
        .plan_credits
        .get(plan)
        .ok_or_else(|| ToolError::UnknownPlan(plan.to_string()))?;

    let mut lines = Vec::with_capacity(deliverables.len());
    for d in deliverables {
        let price = costs.get(&d.model).copied();
        if price.is_none() {
            warn!("Model '{}' has no price on the {} plan; costed at 0", d.model, plan);
        }
        let cost_per_gen = price.unwrap_or(0);
        let iterations = table.iterations_for(&d.asset_type);
        let line_total = d
            .count
            .checked_mul(cost_per_gen)
            .and_then(|n| n.checked_mul(iterations))
            .ok_or_else(|| {
                ToolError::InvalidInput(format!(
                    "Credit total overflows for '{} x {} using {}'",
                    d.count, d.asset_type, d.model
                ))
            })?;
        lines.push(BudgetLine {
            count: d.count,
            asset_type: d.asset_type.clone(),
            model: d.model.clone(),
            cost_per_gen,
            iterations,
            line_total,
            priced: price.is_some(),
        });
    }

    let overflow = || ToolError::InvalidInput("Credit total is too large to compute".to_string());
    let total = lines
        .iter()
        .try_fold(0u64, |acc, l| acc.checked_add(l.line_total))
        .ok_or_else(overflow)?;
    let buffer = total / 100 * BUFFER_PERCENT + total % 100 * BUFFER_PERCENT / 100;
    let total_with_buffer = total.checked_add(buffer).ok_or_else(overflow)?;
    let surplus_or_shortfall = i64::try_from(available)
        .ok()
        .zip(i64::try_from(total_with_buffer).ok())
        .map(|(a, t)| a - t)
        .ok_or_else(overflow)?;

    Ok(Budget {
        plan: plan.to_string(),
        lines,
        total,
        buffer,
        total_with_buffer,
        available,
        surplus_or_shortfall,
    })
}

impl Budget {
    pub fn to_json(&self) -> Result<String, ToolError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn render_text(&self) -> String {
        let rule = "-".repeat(60);
        let mut lines = vec![
            format!("CREDIT BUDGET \u{2014} {} PLAN", self.plan.to_uppercase()),
            "=".repeat(60),
            String::new(),
            format!(
                "{:<20} {:<20} {:<6} {:<5} {:<8}",
                "Deliverable", "Model", "\u{d7}Gen", "Iter", "Total"
            ),
            rule.clone(),
        ];

        for l in &self.lines {
            lines.push(format!(
                "{}x {:<16} {:<20} {:<6} \u{d7}{:<4} {:<8}",
                l.count, l.asset_type, l.model, l.cost_per_gen, l.iterations, l.line_total
            ));
            if !l.priced {
                lines.push(format!("   (no price for '{}' on this plan)", l.model));
            }
        }

        lines.push(rule.clone());
        lines.push(format!("{:<46} {}", "Estimated total:", self.total));
        lines.push(format!("{:<46} {}", format!("Buffer ({}%):", BUFFER_PERCENT), self.buffer));
        lines.push(format!("{:<46} {}", "Total with buffer:", self.total_with_buffer));
        lines.push(format!("{:<46} {}", "Available credits:", self.available));
        lines.push(rule);

        let diff = self.surplus_or_shortfall;
        if diff >= 0 {
            lines.push(format!("SURPLUS: {} credits remaining", diff));
        } else {
            lines.push(format!("SHORTFALL: {} credits over budget", diff.unsigned_abs()));
            lines.push("Options: reduce scope, use cheaper draft models, or top up".to_string());
        }

        lines
            .iter()
            .map(|l| l.trim_end())
            .collect::<Vec<_>>()
            .join("\n")
    }
}
