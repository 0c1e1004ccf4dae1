//! Builds the LLM/image clients and per-category gatherers/analyzers from
//! validated configuration, then assembles an `Orchestrator`.

use std::sync::Arc;

use briefing_core::config::{EnvSource, ImageMode, LlmMode, ProvidersConfig};
use briefing_core::cost::CostAccumulator;
use briefing_core::error::LlmError;
use briefing_core::gather::{community::CommunityGatherer, news::NewsGatherer, research::ResearchGatherer, social::SocialGatherer, Gatherer};
use briefing_core::analyze::{Analyzer, MapReduceAnalyzer};
use briefing_core::http::HttpPool;
use briefing_core::image::{ImageClient, NativeImageClient, ProxyImageClient};
use briefing_core::llm::anthropic::{DirectAnthropicClient, ProxyAnthropicClient};
use briefing_core::llm::LlmClient;
use briefing_core::model::{Category, Source, SourceKind};
use briefing_core::orchestrate::Orchestrator;

use crate::RunArgs;

pub fn build_orchestrator(
    config: &ProvidersConfig,
    env: &impl EnvSource,
    args: &RunArgs,
) -> Result<Orchestrator, LlmError> {
    let http = Arc::new(HttpPool::new(config.runtime.http_pool_size));
    let cost = Arc::new(CostAccumulator::new());

    let llm: Arc<dyn LlmClient> = build_llm_client(config, env, &http, &cost)?;
    let image: Option<Arc<dyn ImageClient>> = build_image_client(config, env, &http);

    let (gatherers, news_gatherer) = build_gatherers(config, &http, env)?;
    let analyzers = build_analyzers(&llm, &config.runtime);

    Ok(Orchestrator::new(
        http,
        llm,
        image,
        cost,
        gatherers,
        analyzers,
        news_gatherer,
        args.ecosystem_file.clone(),
        args.registry_url.clone(),
        args.output_dir.clone(),
        std::time::Duration::from_secs(config.runtime.run_deadline_secs),
    ))
}

fn build_llm_client(
    config: &ProvidersConfig,
    env: &impl EnvSource,
    http: &Arc<HttpPool>,
    cost: &Arc<CostAccumulator>,
) -> Result<Arc<dyn LlmClient>, LlmError> {
    let api_key = config
        .llm
        .api_key
        .resolve(env)
        .map_err(|_| LlmError::NotConfigured)?;

    Ok(match config.llm.mode {
        LlmMode::Direct => Arc::new(DirectAnthropicClient::with_base_url(
            http.clone(),
            cost.clone(),
            api_key,
            config.llm.model.clone(),
            config.llm.base_url.clone(),
        )),
        LlmMode::Proxy => Arc::new(ProxyAnthropicClient::new(
            http.clone(),
            cost.clone(),
            api_key,
            config.llm.model.clone(),
            config.llm.base_url.clone(),
        )),
    })
}

fn build_image_client(
    config: &ProvidersConfig,
    env: &impl EnvSource,
    http: &Arc<HttpPool>,
) -> Option<Arc<dyn ImageClient>> {
    let image_config = config.image.as_ref()?;
    let api_key = image_config.api_key.resolve(env).ok()?;

    Some(match image_config.mode {
        ImageMode::Native => Arc::new(NativeImageClient::new(
            http.clone(),
            api_key,
            image_config.model.clone(),
        )),
        ImageMode::Proxy => {
            let endpoint = image_config.endpoint.clone()?;
            Arc::new(ProxyImageClient::new(http.clone(), api_key, image_config.model.clone(), endpoint))
        }
    })
}

fn sources_from_file(
    path: &str,
    category: Category,
    source_kind: SourceKind,
) -> Result<Vec<Source>, LlmError> {
    if path.is_empty() {
        return Ok(Vec::new());
    }
    let identifiers = briefing_core::config::parse_source_list(std::path::Path::new(path))
        .map_err(|_| LlmError::NotConfigured)?;
    Ok(identifiers
        .into_iter()
        .map(|identifier| Source {
            identifier,
            category,
            source_kind,
        })
        .collect())
}

fn build_gatherers(
    config: &ProvidersConfig,
    http: &Arc<HttpPool>,
    env: &impl EnvSource,
) -> Result<([Arc<dyn Gatherer>; 4], Arc<NewsGatherer>), LlmError> {
    let news_sources = sources_from_file(&config.sources.rss_feeds, Category::News, SourceKind::Rss)?;
    let research_sources = sources_from_file(
        &config.sources.preprint_categories,
        Category::Research,
        SourceKind::Preprint,
    )?;
    let research_feed_sources =
        sources_from_file(&config.sources.research_feeds, Category::Research, SourceKind::Rss)?;
    let microblog_sources = sources_from_file(&config.sources.microblog_accounts, Category::Social, SourceKind::Api)?;
    let federated_microblog_sources = sources_from_file(
        &config.sources.federated_microblog_accounts,
        Category::Social,
        SourceKind::Api,
    )?;
    let federated_longform_sources = sources_from_file(
        &config.sources.federated_longform_accounts,
        Category::Social,
        SourceKind::Api,
    )?;
    let forum_sources = sources_from_file(&config.sources.forum_names, Category::Community, SourceKind::Forum)?;

    let microblog_bearer_token = env.get("BRIEFING_MICROBLOG_API_KEY");

    let news_concrete = Arc::new(NewsGatherer::new(http.clone(), news_sources));
    let news: Arc<dyn Gatherer> = news_concrete.clone();
    let research: Arc<dyn Gatherer> =
        Arc::new(ResearchGatherer::new(http.clone(), research_sources, research_feed_sources));
    let social: Arc<dyn Gatherer> = Arc::new(SocialGatherer::new(
        http.clone(),
        microblog_sources,
        federated_microblog_sources,
        federated_longform_sources,
        microblog_bearer_token,
    ));
    let community: Arc<dyn Gatherer> = Arc::new(CommunityGatherer::new(http.clone(), forum_sources));

    Ok(([news, research, social, community], news_concrete))
}

fn build_analyzers(
    llm: &Arc<dyn LlmClient>,
    runtime: &briefing_core::config::RuntimeConfig,
) -> [Arc<dyn Analyzer>; 4] {
    Category::ALL.map(|category| {
        Arc::new(
            MapReduceAnalyzer::new(llm.clone(), category).with_tuning(
                runtime.map_batch_size,
                runtime.per_category_concurrency,
                30,
            ),
        ) as Arc<dyn Analyzer>
    })
}
