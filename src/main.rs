use std::error::Error;
use std::path::PathBuf;

use chrono::{DateTime, Local, NaiveDate, Utc};
use clap::{Parser, Subcommand};

use goalpost::analysis::{daily_goal_totals, estimate_completion};
use goalpost::domain::{MS_PER_HOUR, format_duration, format_timestamp, local_day_for_timestamp};
use goalpost::engine::GoalTracker;
use goalpost::paths::resolve_data_dir;
use goalpost::storage::FileStore;

#[derive(Debug, Parser)]
#[command(name = "goalpost", about = "Local goal and time tracker")]
struct Cli {
	#[arg(long)]
	data_dir: Option<PathBuf>,
	#[command(subcommand)]
	command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
	Init,
	Add {
		#[arg(long)]
		title: String,
		#[arg(long, default_value = "")]
		description: String,
		#[arg(long)]
		hours: f64,
	},
	Remove {
		#[arg(long)]
		goal: String,
	},
	Start {
		#[arg(long)]
		goal: String,
	},
	Stop,
	Log {
		#[arg(long)]
		goal: String,
		#[arg(long)]
		hours: f64,
		#[arg(long)]
		date: Option<String>,
	},
	List,
	Status,
	Summary {
		#[arg(long)]
		day: Option<String>,
	},
	Estimate {
		#[arg(long)]
		goal: String,
	},
}

fn main() {
	if let Err(err) = run() {
		eprintln!("error: {err}");
		std::process::exit(1);
	}
}

fn run() -> Result<(), Box<dyn Error>> {
	let cli = Cli::parse();
	let data_dir = resolve_data_dir(cli.data_dir);
	let mut tracker = GoalTracker::open(FileStore::new(&data_dir));
	let now = Utc::now();

	match cli.command {
		Command::Init => {
			tracker.persist()?;
			println!("initialized goalpost data in {}", data_dir.display());
		}
		Command::Add {
			title,
			description,
			hours,
		} => {
			let goal = tracker.create_goal(&title, &description, hours, now)?;
			println!("created goal {} ({})", goal.id, goal.title);
		}
		Command::Remove { goal } => {
			if tracker.delete_goal(&goal)? {
				println!("removed {goal}");
			} else {
				println!("no goal with id {goal}");
			}
		}
		Command::Start { goal } => {
			tracker.start_timer(&goal, now)?;
			println!("timer started for {goal}");
		}
		Command::Stop => match tracker.stop_timer(now)? {
			Some(session) => println!(
				"recorded {} for {}",
				format_duration(session.duration_ms),
				session.goal_id
			),
			None => println!("no timer running"),
		},
		Command::Log { goal, hours, date } => {
			let date = parse_day(date.as_deref())?;
			let session = tracker.add_manual_time(&goal, hours, date, now)?;
			println!(
				"logged {} for {} (ends {})",
				format_duration(session.duration_ms),
				goal,
				format_timestamp(session.end_time)
			);
		}
		Command::List => print_goals(&tracker, now),
		Command::Status => print_status(&tracker, now),
		Command::Summary { day } => {
			let day = parse_day(day.as_deref())?.unwrap_or_else(|| local_day_for_timestamp(now));
			print_summary(&tracker, day);
		}
		Command::Estimate { goal } => print_estimate(&tracker, &goal, now)?,
	}

	Ok(())
}

fn parse_day(input: Option<&str>) -> Result<Option<NaiveDate>, Box<dyn Error>> {
	match input {
		Some(raw) => Ok(Some(NaiveDate::parse_from_str(raw, "%Y-%m-%d")?)),
		None => Ok(None),
	}
}

fn print_goals(tracker: &GoalTracker<FileStore>, now: DateTime<Utc>) {
	if tracker.goals().is_empty() {
		println!("no goals yet");
		return;
	}

	for goal in tracker.goals() {
		let marker = if goal.is_active { "*" } else { " " };
		let spent_hours = goal.live_spent_ms(now) as f64 / MS_PER_HOUR as f64;
		let percent = if goal.total_hours > 0.0 {
			(spent_hours / goal.total_hours).min(1.0) * 100.0
		} else {
			0.0
		};
		println!(
			"{} {} | {} | {:.1}/{:.1} h ({:.0}%)",
			marker, goal.id, goal.title, spent_hours, goal.total_hours, percent
		);
	}
}

fn print_status(tracker: &GoalTracker<FileStore>, now: DateTime<Utc>) {
	match tracker.active_goal() {
		Some(goal) => {
			println!("tracking: {} ({})", goal.title, goal.id);
			if let Some(start) = goal.start_time {
				println!("started:  {}", format_timestamp(start));
			}
			println!("elapsed:  {}", format_duration(goal.elapsed_ms(now)));
		}
		None => println!("no timer running"),
	}
}

fn print_summary(tracker: &GoalTracker<FileStore>, day: NaiveDate) {
	let totals = daily_goal_totals(tracker.sessions(), day);

	println!("summary for {}", day.format("%Y-%m-%d"));
	if totals.is_empty() {
		println!("no tracked sessions for this day");
		return;
	}

	for (goal_id, duration_ms) in &totals {
		let title = tracker
			.goal(goal_id)
			.map(|goal| goal.title.clone())
			.unwrap_or_else(|| "(deleted goal)".to_string());
		println!("{} | {} | {}", format_duration(*duration_ms), goal_id, title);
	}
}

fn print_estimate(
	tracker: &GoalTracker<FileStore>,
	goal_id: &str,
	now: DateTime<Utc>,
) -> Result<(), Box<dyn Error>> {
	let goal = tracker
		.goal(goal_id)
		.ok_or_else(|| format!("goal not found: {goal_id}"))?;

	match estimate_completion(goal, tracker.sessions(), now) {
		Some(when) => println!(
			"{}: on pace to finish around {}",
			goal.title,
			when.with_timezone(&Local).format("%Y-%m-%d")
		),
		None => println!(
			"{}: not enough history to estimate (or already complete)",
			goal.title
		),
	}

	Ok(())
}
