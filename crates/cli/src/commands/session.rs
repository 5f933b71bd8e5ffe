//! `tutorstitch stitch|advance|show|reset` — One-shot operations against
//! the configured store.

use tutorstitch_config::AppConfig;
use tutorstitch_engine::session::{GenerationSettings, SessionManager, StitchRequest};

async fn open_sessions() -> Result<SessionManager, Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let store = tutorstitch_memory::open_store(&config.store).await?;
    let mut sessions = SessionManager::from_config(&config, store);
    if let Some(provider) = tutorstitch_providers::build_from_config(&config.generation) {
        sessions =
            sessions.with_provider(provider, GenerationSettings::from_config(&config.generation));
    }
    Ok(sessions)
}

pub async fn stitch(
    user: String,
    message: String,
    location: Option<String>,
    stage: Option<u32>,
) -> Result<(), Box<dyn std::error::Error>> {
    let sessions = open_sessions().await?;
    let reply = sessions
        .respond(StitchRequest {
            user_key: user,
            message,
            location,
            stage,
        })
        .await?;
    let stitched = &reply.stitched;

    if stitched.created {
        println!(
            "🆕 New user {} at {} (stage {})",
            stitched.state.user_key, stitched.state.location, stitched.state.current_stage
        );
    }
    if let Some(event) = &stitched.summarized {
        println!(
            "🗜️  Summarized {} messages ({:?}): {}",
            event.compressed_messages, event.reason, event.summary
        );
    }

    println!("\n📤 Prompt:");
    println!("{}", "=".repeat(70));
    print!("{}", stitched.prompt);
    println!("{}", "=".repeat(70));

    match (&reply.completion, &reply.error) {
        (Some(text), _) => println!("\n🤖 {text}"),
        (None, Some(err)) => println!("\n⚠️  Generation failed: {err}"),
        (None, None) => {}
    }

    Ok(())
}

pub async fn advance(user: &str, milestone: &str) -> Result<(), Box<dyn std::error::Error>> {
    let sessions = open_sessions().await?;
    let state = sessions.advance_stage(user, milestone).await?;
    println!(
        "✅ {user} advanced to stage {}/{} ({} milestones)",
        state.current_stage,
        sessions.settings().total_stages,
        state.completed_milestones.len()
    );
    Ok(())
}

pub async fn show(user: &str) -> Result<(), Box<dyn std::error::Error>> {
    let sessions = open_sessions().await?;
    match sessions.state(user).await? {
        Some(state) => println!("{}", serde_json::to_string_pretty(&state)?),
        None => println!("No state stored for {user}"),
    }
    Ok(())
}

pub async fn reset(user: &str, confirm: bool) -> Result<(), Box<dyn std::error::Error>> {
    let sessions = open_sessions().await?;

    if !confirm {
        match sessions.state(user).await? {
            Some(state) => {
                println!(
                    "⚠️  This will delete {user} (stage {}, {} buffered messages).",
                    state.current_stage,
                    state.episodic_buffer.len()
                );
                println!("   Re-run with --confirm to proceed.");
            }
            None => println!("No state stored for {user}"),
        }
        return Ok(());
    }

    if sessions.reset(user).await? {
        println!("🗑️  Deleted state for {user}");
    } else {
        println!("No state stored for {user}");
    }
    Ok(())
}
