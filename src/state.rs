use std::sync::Arc;

use crate::config::{AppConfig, StoreBackend};
use crate::nutrition::client::NutritionClient;
use crate::recipes::memory::MemoryRecipeRepo;
use crate::recipes::repo::{PgRecipeRepo, RecipeRepo};

#[derive(Clone)]
pub struct AppState {
    pub recipes: Arc<dyn RecipeRepo>,
    pub nutrition: NutritionClient,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let recipes = match config.store {
            StoreBackend::Postgres => {
                let db = crate::db::connect(&config).await?;
                Arc::new(PgRecipeRepo::new(db)) as Arc<dyn RecipeRepo>
            }
            StoreBackend::Memory => {
                tracing::warn!("using in-memory recipe store; data is lost on restart");
                Arc::new(MemoryRecipeRepo::default()) as Arc<dyn RecipeRepo>
            }
        };

        let nutrition = NutritionClient::new(config.nutrition.clone())?;
        if nutrition.mock_mode() {
            tracing::info!("nutrition lookups served from the offline dataset");
        }

        Ok(Self {
            recipes,
            nutrition,
            config,
        })
    }

    /// Memory store and an offline nutrition client.
    #[cfg(test)]
    pub fn fake() -> Self {
        use std::time::Duration;

        use crate::config::NutritionApiConfig;

        let nutrition_config = NutritionApiConfig {
            url: "http://127.0.0.1:9/ingredients.php".into(),
            username: "name".into(),
            password: "password".into(),
            timeout: Duration::from_millis(200),
            mock_mode: true,
        };
        let config = Arc::new(AppConfig {
            host: "127.0.0.1".into(),
            port: 0,
            store: StoreBackend::Memory,
            database_url: None,
            database_max_connections: 1,
            nutrition: nutrition_config.clone(),
        });

        Self {
            recipes: Arc::new(MemoryRecipeRepo::default()),
            nutrition: NutritionClient::new(nutrition_config).expect("http client builds"),
            config,
        }
    }
}
