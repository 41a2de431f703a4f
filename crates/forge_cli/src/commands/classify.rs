//! Show how a message would be routed.

use anyhow::Result;
use console::style;
use forge_core::classify_intent;

pub fn run(text: &str, json: bool) -> Result<()> {
    let analysis = classify_intent(text);
    if json {
        println!("{}", serde_json::to_string_pretty(&analysis)?);
        return Ok(());
    }

    println!("Mode:        {}", style(analysis.mode).cyan().bold());
    println!("Confidence:  {:.2}", analysis.confidence);
    println!("Complex:     {}", analysis.is_complex);
    println!("Needs plan:  {}", analysis.requires_plan);
    println!(
        "Scores:      plan={} action={} discussion={}",
        analysis.scores.plan, analysis.scores.action, analysis.scores.discussion
    );

    Ok(())
}
