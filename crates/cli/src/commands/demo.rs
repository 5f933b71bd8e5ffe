//! `tutorstitch demo` — Scripted tutoring walkthrough.
//!
//! Runs entirely in memory; nothing is written to the configured store.

use std::sync::Arc;

use tutorstitch_engine::session::{NewUserDefaults, SessionManager, StitchRequest};
use tutorstitch_engine::stitcher::{ContextStitcher, StitcherSettings};
use tutorstitch_engine::template::LOCAL_CONTEXT;
use tutorstitch_memory::InMemoryStore;

fn banner(title: &str) {
    println!("\n{}", "=".repeat(70));
    println!("{title}");
    println!("{}", "=".repeat(70));
}

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let sessions = SessionManager::new(
        Arc::new(InMemoryStore::new()),
        StitcherSettings::default(),
        NewUserDefaults::default(),
    );

    banner("Dual threshold: interaction count");
    for i in 1..=6 {
        let reply = sessions
            .stitch(StitchRequest::new(
                "demo_student",
                format!("Question {i}: What sensors should I use?"),
            ))
            .await?;
        match &reply.summarized {
            Some(event) => println!(
                "  #{i} 🗜️  summarized {} messages → {}",
                event.compressed_messages, event.summary
            ),
            None => println!(
                "  #{i} buffered ({} interactions)",
                reply.state.interaction_count
            ),
        }
    }

    banner("Dual threshold: token volume");
    let long_query = "I am working on reducing marine pollution in Tuticorin. I need to select \
appropriate sensors for water quality monitoring: pH, turbidity, dissolved oxygen and heavy \
metals. What about cost, waterproofing, calibration and maintenance schedules? "
        .repeat(10);
    let reply = sessions
        .stitch(
            StitchRequest::new("demo_student_2", long_query)
                .with_location("Chennai")
                .with_stage(10),
        )
        .await?;
    if let Some(event) = &reply.summarized {
        println!(
            "  One message, {} tokens ({:?}) → {}",
            event.buffer_tokens, event.reason, event.summary
        );
    }

    banner("Keyword summarization");
    let conversation = [
        "I need to select sensors for water quality monitoring",
        "What is the best pH sensor for marine environments?",
        "I decided to use Atlas Scientific pH sensor",
        "How much does it cost?",
        "Let's also look at turbidity sensors",
        "I want to collect data weekly",
    ];
    for message in conversation {
        sessions
            .stitch(
                StitchRequest::new("semantic_demo", message)
                    .with_location("Tuticorin")
                    .with_stage(15),
            )
            .await?;
    }
    if let Some(state) = sessions.state("semantic_demo").await? {
        println!("  Summary: {}", state.summary);
        println!("  Buffered: {:?}", state.episodic_buffer);
    }

    banner("Stage progression");
    sessions
        .stitch(StitchRequest::new("progression_demo", "Let's begin").with_stage(1))
        .await?;
    for milestone in [
        "Problem identification completed",
        "Literature review finished",
        "Hardware selection finalized",
        "Prototype design approved",
        "Component procurement done",
    ] {
        let state = sessions.advance_stage("progression_demo", milestone).await?;
        println!("  ✅ Stage {} → {}: {milestone}", state.current_stage - 1, state.current_stage);
    }

    banner("Geographic injection");
    for location in ["Erode", "Tuticorin", "Chennai", "Madurai"] {
        let stitcher = ContextStitcher::new("geo_demo", location, 10);
        let sections = stitcher.sections("What environmental factors should I consider?");
        println!("  {}", sections.body(LOCAL_CONTEXT).unwrap_or_default());
    }

    banner("Complete prompt (student_018, Erode, stage 14)");
    let reply = sessions
        .stitch(StitchRequest::new(
            "student_018",
            "What sensors should I use for monitoring marine pollution?",
        ))
        .await?;
    print!("{}", reply.prompt);

    banner("Stored users");
    for user in sessions.users().await? {
        println!("  • {user}");
    }

    Ok(())
}
