use anyhow::{Context, Result, bail};
use futures::StreamExt;
use tracing_subscriber::EnvFilter;

use plitso::Plitso;
use plitso::assistant::AskOutcome;
use plitso::config::Config;
use plitso::models::{DIETARY_OPTIONS, MOODS, MealType};

const USAGE: &str = "usage: plitso <command>

commands:
  sync                                               refresh the local recipe cache
  day-recipe                                         show the recipe of the day
  ask <question>                                     ask the assistant in a new chat
  suggest <meal-type> <cuisine> <mood> [dietary] [--quick]
                                                     get a meal suggestion
  chats                                              list stored chats";

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr, answers to stdout
    tracing_subscriber::fmt()
        .with_target(false)
        .with_ansi(false)
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first() else {
        println!("{USAGE}");
        return Ok(());
    };

    let config = Config::load();
    let app = Plitso::new(&config).await?;

    match command.as_str() {
        "sync" => {
            let report = app.recipes().refresh_database().await;
            println!(
                "{} categories, {} recipes, {} details",
                report.categories, report.recipes, report.details
            );
            for failure in &report.failures {
                println!("failed: {failure}");
            }
        }
        "day-recipe" => {
            let recipe = app
                .recipes()
                .day_recipe()
                .next()
                .await
                .context("day recipe stream ended")??;
            println!("{} ({}, {})", recipe.title, recipe.area, recipe.category);
            println!("\n{}", recipe.instructions);
        }
        "ask" => {
            let question = args[1..].join(" ");
            if question.trim().is_empty() {
                bail!("ask needs a question\n\n{USAGE}");
            }
            let mut assistant = app.assistant();
            assistant.start_new_chat();
            match assistant.ask_question(&question).await {
                AskOutcome::Completed { answer_id, .. } => {
                    let chat = assistant.current_chat().context("chat was reset")?;
                    let answers = app.store().get_answers(chat.id).await?;
                    if let Some(answer) = answers.iter().find(|a| a.id == answer_id) {
                        println!("# {}\n\n{}", chat.title, answer.content);
                    }
                }
                AskOutcome::Failed { step, message, .. } => {
                    bail!("ask failed at {step:?}: {message}");
                }
                AskOutcome::NoActiveChat => bail!("no active chat"),
            }
        }
        "suggest" => {
            let quick = args.iter().any(|a| a == "--quick");
            let values: Vec<&String> = args[1..].iter().filter(|a| *a != "--quick").collect();
            if values.len() < 3 {
                bail!("suggest needs a meal type, cuisine and mood\n\n{USAGE}");
            }

            let Some(meal_type) = MealType::from_name(values[0]) else {
                let names: Vec<&str> = MealType::ALL.iter().map(MealType::name).collect();
                bail!("meal type must be one of: {}", names.join(", "));
            };
            let Some(mood) = pick(&MOODS, values[2]) else {
                bail!("mood must be one of: {}", MOODS.join(", "));
            };
            let dietary = match values.get(3) {
                Some(value) => match pick(&DIETARY_OPTIONS, value) {
                    Some(option) => option,
                    None => bail!("dietary must be one of: {}", DIETARY_OPTIONS.join(", ")),
                },
                None => "",
            };

            let mut assistant = app.assistant();
            assistant.refresh_context(Vec::new()).await?;
            assistant.on_meal_type_change(meal_type.name());
            assistant.on_cuisine_change(values[1].as_str());
            assistant.on_mood_change(mood);
            assistant.on_dietary_change(dietary);
            assistant.on_quick_change(quick);

            assistant.generate_suggestions(|| {}).await;
            let state = assistant.generative_state();
            if !state.error_message.is_empty() {
                bail!("{}", state.error_message);
            }
            println!("{}", state.generative_answer);
        }
        "chats" => {
            let assistant = app.assistant();
            let chats = assistant
                .chat_histories()
                .next()
                .await
                .context("chat list stream ended")??;
            if chats.is_empty() {
                println!("no chats yet");
            }
            for chat in chats {
                let title = if chat.title.is_empty() { "(untitled)" } else { chat.title.as_str() };
                println!("{}  {}  {}", chat.id, chat.started_on.format("%Y-%m-%d %H:%M"), title);
            }
        }
        other => bail!("unknown command: {other}\n\n{USAGE}"),
    }

    Ok(())
}

/// Case-insensitive match against a fixed option list
fn pick(options: &[&'static str], value: &str) -> Option<&'static str> {
    options
        .iter()
        .copied()
        .find(|option| option.eq_ignore_ascii_case(value.trim()))
}
