use anyhow::{Context, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};
use college_recommender::models::{Category, Config, Gender, InstituteType, RecommendationGroup, StudentQuery};
use college_recommender::service::RecommendationService;
use std::fs;
use std::path::Path;

fn cli() -> Command {
    Command::new("college-recommender")
        .version("1.0")
        .about("Recommends engineering colleges from JEE admission cutoff tables")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value("config.toml")
                .global(true),
        )
        .subcommand_required(true)
        .subcommand(
            Command::new("recommend")
                .about("Rank colleges for a student")
                .arg(
                    Arg::new("rank")
                        .long("rank")
                        .value_name("RANK")
                        .help("Entrance exam rank")
                        .required(true)
                        .value_parser(clap::value_parser!(u32)),
                )
                .arg(
                    Arg::new("category")
                        .long("category")
                        .value_name("CATEGORY")
                        .help("GENERAL, OPEN, OBC, OBC-NCL, SC, ST or EWS")
                        .required(true),
                )
                .arg(
                    Arg::new("gender")
                        .long("gender")
                        .value_name("GENDER")
                        .help("Gender-Neutral, Female-only or Male-only")
                        .default_value("Gender-Neutral"),
                )
                .arg(Arg::new("home-city").long("home-city").value_name("CITY"))
                .arg(Arg::new("home-state").long("home-state").value_name("STATE"))
                .arg(
                    Arg::new("institutes")
                        .long("institutes")
                        .value_name("TYPES")
                        .help("Comma separated institute types, e.g. IIT,NIT")
                        .value_delimiter(','),
                )
                .arg(
                    Arg::new("branches")
                        .long("branches")
                        .value_name("BRANCHES")
                        .help("Comma separated branch tokens, e.g. CSE,ECE")
                        .value_delimiter(','),
                )
                .arg(
                    Arg::new("max-distance")
                        .long("max-distance")
                        .value_name("KM")
                        .help("Only keep colleges within this distance from home")
                        .value_parser(clap::value_parser!(u32)),
                )
                .arg(
                    Arg::new("max-closing-rank")
                        .long("max-closing-rank")
                        .value_name("RANK")
                        .value_parser(clap::value_parser!(u32)),
                )
                .arg(
                    Arg::new("csv")
                        .long("csv")
                        .help("Also write recommendations.csv to the output directory")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(Command::new("filters").about("List the filter values present in the data"))
        .subcommand(Command::new("summary").about("Print a JSON summary of the loaded tables"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();

    let config_file = matches
        .get_one::<String>("config")
        .map(String::as_str)
        .unwrap_or("config.toml");

    let config = if Path::new(config_file).exists() {
        println!("📋 Loading configuration from: {}", config_file);
        Config::load_from_file(config_file)
            .with_context(|| format!("failed to load configuration from {}", config_file))?
    } else {
        println!("📝 Creating default configuration file: {}", config_file);
        Config::default().save_to_file(config_file)?;
        println!(
            "⚠️  Please review {} (data_directory, geo_table), then run the program again.",
            config_file
        );
        return Ok(());
    };

    env_logger::init_from_env(env_logger::Env::default().default_filter_or(config.log_level.as_str()));

    let service = RecommendationService::new(&config);

    println!("📂 Reading admission tables from: {}", config.data_directory);
    let report = service
        .load_data()
        .await
        .with_context(|| format!("failed to load data from {}", config.data_directory))?;
    println!(
        "   ✅ Loaded {} tables ({} rows)",
        report.tables.len(),
        report.total_records
    );
    for skipped in &report.skipped {
        println!("   ⚠️  Skipped {}: {}", skipped.path.display(), skipped.reason);
    }

    match matches.subcommand() {
        Some(("recommend", args)) => run_recommend(&service, &config, args).await?,
        Some(("filters", _)) => run_filters(&service).await?,
        Some(("summary", _)) => {
            let summary = service.data_summary().await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        _ => unreachable!("subcommand is required"),
    }

    Ok(())
}

fn query_from_args(args: &ArgMatches) -> Result<StudentQuery> {
    let rank = *args.get_one::<u32>("rank").context("--rank is required")?;
    let category: Category = args
        .get_one::<String>("category")
        .context("--category is required")?
        .parse::<Category>()
        .map_err(anyhow::Error::msg)?;
    let gender: Gender = args
        .get_one::<String>("gender")
        .map(String::as_str)
        .unwrap_or("Gender-Neutral")
        .parse::<Gender>()
        .map_err(anyhow::Error::msg)?;

    let mut query = StudentQuery::new(rank, category, gender);
    query.home_city = args.get_one::<String>("home-city").cloned();
    query.home_state = args.get_one::<String>("home-state").cloned();
    query.max_distance_km = args.get_one::<u32>("max-distance").copied();
    query.max_closing_rank = args.get_one::<u32>("max-closing-rank").copied();

    if let Some(institutes) = args.get_many::<String>("institutes") {
        query.preferred_institutes = institutes
            .filter(|token| !token.trim().is_empty())
            .map(|token| token.parse::<InstituteType>())
            .collect::<Result<_, _>>()
            .map_err(anyhow::Error::msg)?;
    }
    if let Some(branches) = args.get_many::<String>("branches") {
        query.preferred_branches = branches
            .map(|branch| branch.trim().to_string())
            .filter(|branch| !branch.is_empty())
            .collect();
    }

    Ok(query)
}

async fn run_recommend(service: &RecommendationService, config: &Config, args: &ArgMatches) -> Result<()> {
    let query = query_from_args(args)?;

    println!(
        "🔍 Finding colleges for rank {} ({}, {})",
        query.rank, query.category, query.gender
    );
    let institutes: Vec<&str> = query.preferred_institutes.iter().map(|t| t.as_str()).collect();
    println!("🎯 Institute types: {}", institutes.join(", "));
    println!("📚 Branches: {}", query.preferred_branches.join(", "));
    if let (Some(km), Some(home)) = (query.max_distance_km, query.home_location()) {
        println!("📍 Within {} km of {}", km, home);
    }

    let groups = service.recommend(&query).await?;
    print_recommendations(&groups);

    if args.get_flag("csv") {
        let output_dir = config.output_directory.as_deref().unwrap_or("output");
        fs::create_dir_all(output_dir)?;
        let csv_path = Path::new(output_dir).join("recommendations.csv");
        write_recommendations_csv(&groups, &csv_path)?;
        println!("\n📄 Recommendations written to: {}", csv_path.display());
    }

    Ok(())
}

async fn run_filters(service: &RecommendationService) -> Result<()> {
    let filters = service.available_filters().await?;

    println!("\n🗂️  AVAILABLE FILTERS");
    println!("====================\n");
    let sections: [(&str, &Vec<String>); 7] = [
        ("Categories", &filters.categories),
        ("Genders", &filters.genders),
        ("Quotas", &filters.quotas),
        ("States", &filters.states),
        ("Branches", &filters.branches),
        ("Institutes", &filters.institutes),
        ("Cities", &filters.cities),
    ];
    for (title, values) in sections {
        println!("{} ({}):", title, values.len());
        for value in values {
            println!("   • {}", value);
        }
        println!();
    }
    Ok(())
}

fn print_recommendations(groups: &[RecommendationGroup]) {
    println!("\n📊 RECOMMENDATIONS");
    println!("==================\n");

    if groups.is_empty() {
        println!("   ❓ No colleges match this rank and these preferences");
        return;
    }

    for (i, group) in groups.iter().enumerate() {
        let location = match group.distance_km {
            Some(km) => format!("{}, {} ({:.0} km)", group.city, group.state, km),
            None => format!("{}, {}", group.city, group.state),
        };
        println!(
            "   {}. [{}] {} - {} [{}] score {}",
            i + 1,
            group.institute_type,
            group.institute_name,
            group.branch,
            location,
            group.recommendation_score
        );
        for band in &group.quota_options {
            let opening = band
                .opening_rank
                .map(|rank| rank.to_string())
                .unwrap_or_else(|| "-".to_string());
            println!(
                "      {} quota: opening {} / closing {}",
                band.quota, opening, band.closing_rank
            );
        }
    }
}

fn write_recommendations_csv(groups: &[RecommendationGroup], csv_path: &Path) -> Result<()> {
    use csv::Writer;

    let mut writer = Writer::from_path(csv_path)?;

    writer.write_record(&[
        "Rank",
        "Score",
        "Institute",
        "Institute Type",
        "Branch",
        "Category",
        "Gender",
        "City",
        "State",
        "Distance (km)",
        "Quota",
        "Opening Rank",
        "Closing Rank",
    ])?;

    for (i, group) in groups.iter().enumerate() {
        for band in &group.quota_options {
            writer.write_record(&[
                (i + 1).to_string(),
                group.recommendation_score.to_string(),
                group.institute_name.clone(),
                group.institute_type.to_string(),
                group.branch.clone(),
                group.category.clone(),
                group.gender.clone(),
                group.city.clone(),
                group.state.clone(),
                group.distance_km.map(|km| format!("{:.2}", km)).unwrap_or_default(),
                band.quota.clone(),
                band.opening_rank.map(|rank| rank.to_string()).unwrap_or_default(),
                band.closing_rank.to_string(),
            ])?;
        }
    }

    writer.flush()?;
    Ok(())
}
