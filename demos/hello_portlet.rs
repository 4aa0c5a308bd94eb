use portlet_hub::backend::{PageBackend, PageUpdate, StaticResponder};
use portlet_hub::hub::{CacheLevel, ElementHandle, HubEvent, ParameterSet, RenderData, RenderState};
use portlet_hub::{HubConfig, HubError, HubRegistry, RegistrationService, ON_ERROR, ON_STATE_CHANGE};
use std::sync::Arc;

const INITIAL_PAGE: &str = r#"{
    "weather": { "state": { "parameters": { "city": ["Amsterdam"] } } },
    "news":    { "state": { "portletMode": "view", "windowState": "maximized" } }
}"#;

#[tokio::main]
async fn main() -> Result<(), HubError> {
    env_logger::init();

    // One registry per page. The builder validates the configuration before anything is
    // registered.
    let config = HubConfig::builder()
        .max_portlets(8)
        .build()
        .expect("Configuration is not valid");
    let registry = HubRegistry::new(config);

    // Watch everything that happens inside the registry.
    let mut notices = registry.subscribe();
    tokio::spawn(async move {
        while let Ok(notice) = notices.recv().await {
            println!("notice: {notice:?}");
        }
    });

    // The portal answers every action by moving both portlets to Rotterdam.
    let mut rotterdam = RenderState::default();
    rotterdam.set_value("city", Some("Rotterdam".into()));
    let answer = PageUpdate::new()
        .with("weather", rotterdam.clone(), Some(RenderData::new("<p>Rain</p>", "text/html")))
        .with("news", rotterdam, None);

    let initial = PageUpdate::from_json(INITIAL_PAGE).expect("initial page state is not valid");
    let backend = PageBackend::new(&registry, initial, Arc::new(StaticResponder::new(answer)));
    let service = RegistrationService::new(registry.clone(), Arc::new(backend));

    let weather = service.register("weather").await?;
    let news = service.register("news").await?;

    // Listeners learn the current state right away, and again whenever it changes.
    for hub in [&weather, &news] {
        let id = hub.id().clone();
        hub.add_event_listener(ON_STATE_CHANGE, move |ev: &HubEvent| {
            let city = ev.render_state().and_then(|s| s.value("city")).unwrap_or("-");
            let data = ev.render_data().map(|d| d.content.as_str()).unwrap_or("");
            println!("{id}: city={city} {data}");
        })?;
        hub.add_event_listener(ON_ERROR, |ev: &HubEvent| println!("error: {ev:?}"))?;
    }

    // Only one action may be in flight for the whole page.
    let mut params = ParameterSet::new();
    params.insert("city", vec![Some("Rotterdam".into())]);
    let pending = weather.action(params, ElementHandle::form())?;
    if let Err(e) = news.action(ParameterSet::new(), ElementHandle::form()) {
        println!("second action refused: {e}");
    }
    let updated = pending.await?;
    println!("action updated {updated:?}");

    // Resource URLs carry the render state the cache level asks for.
    for level in [CacheLevel::Page, CacheLevel::Portlet, CacheLevel::Full] {
        let url = weather
            .create_resource_url(None, Some(level), Some("forecast".into()))
            .await?;
        println!("{level}: {url}");
    }

    // Script code uses loosely typed arguments.
    let url = weather
        .script()
        .create_resource_url(&[serde_json::json!({"days": ["3"]}).into(), "cacheLevelPortlet".into()])?
        .await?;
    println!("from script: {url}");

    Ok(())
}
