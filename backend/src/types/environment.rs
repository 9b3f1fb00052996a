//! Environment configuration for different deployment stages

use std::env;
use std::time::Duration;

use aws_config::{retry::RetryConfig, timeout::TimeoutConfig, BehaviorVersion, Region};

/// `LocalStack` endpoint used when no override is given in development
const DEFAULT_LOCALSTACK_ENDPOINT: &str = "http://localhost:4566";

/// Application environment configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    /// Production environment
    Production,
    /// Staging environment
    Staging,
    /// Development environment (uses `LocalStack`)
    Development,
}

impl Environment {
    /// Creates an Environment from the `APP_ENV` environment variable
    ///
    /// # Panics
    ///
    /// Panics if `APP_ENV` contains an invalid value
    #[must_use]
    pub fn from_env() -> Self {
        let env = env::var("APP_ENV")
            .unwrap_or_else(|_| "development".to_string())
            .trim()
            .to_lowercase();

        match env.as_str() {
            "production" => Self::Production,
            "staging" => Self::Staging,
            "development" => Self::Development,
            _ => panic!("Invalid environment: {env}"),
        }
    }

    /// Returns the S3 bucket name for the environment
    ///
    /// # Panics
    ///
    /// Panics if the `S3_BUCKET_NAME` environment variable is not set outside development
    #[must_use]
    pub fn s3_bucket(&self) -> String {
        match self {
            Self::Production | Self::Staging => {
                env::var("S3_BUCKET_NAME").expect("S3_BUCKET_NAME environment variable is not set")
            }
            Self::Development => {
                env::var("S3_BUCKET_NAME").unwrap_or_else(|_| "image-optimizer".to_string())
            }
        }
    }

    /// Returns the AWS region, used both for the SDK and for public object URLs
    ///
    /// # Panics
    ///
    /// Panics if the `AWS_REGION` environment variable is not set outside development
    #[must_use]
    pub fn aws_region(&self) -> String {
        match self {
            Self::Production | Self::Staging => {
                env::var("AWS_REGION").expect("AWS_REGION environment variable is not set")
            }
            Self::Development => env::var("AWS_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
        }
    }

    /// Returns the `DynamoDB` table name holding image records
    ///
    /// # Panics
    ///
    /// Panics if the `IMAGES_TABLE_NAME` environment variable is not set outside development
    #[must_use]
    pub fn images_table_name(&self) -> String {
        match self {
            Self::Production | Self::Staging => env::var("IMAGES_TABLE_NAME")
                .expect("IMAGES_TABLE_NAME environment variable is not set"),
            Self::Development => {
                env::var("IMAGES_TABLE_NAME").unwrap_or_else(|_| "images".to_string())
            }
        }
    }

    /// Port the HTTP server listens on
    ///
    /// # Errors
    ///
    /// Returns an error if `PORT` is set but is not a valid port number
    pub fn port(&self) -> Result<u16, std::num::ParseIntError> {
        env::var("PORT").map_or(Ok(3000), |p| p.parse())
    }

    /// Whether to show API docs
    #[must_use]
    pub const fn show_api_docs(&self) -> bool {
        matches!(self, Self::Development | Self::Staging)
    }

    /// Whether logs should be emitted as JSON
    #[must_use]
    pub const fn json_logs(&self) -> bool {
        matches!(self, Self::Production | Self::Staging)
    }

    /// Returns the endpoint URL to use for AWS services
    #[must_use]
    pub fn override_aws_endpoint_url(&self) -> Option<String> {
        match self {
            // Regular AWS endpoints for production and staging
            Self::Production | Self::Staging => None,
            // LocalStack endpoint for development
            Self::Development => Some(
                env::var("AWS_ENDPOINT_URL")
                    .unwrap_or_else(|_| DEFAULT_LOCALSTACK_ENDPOINT.to_string()),
            ),
        }
    }

    /// AWS configuration with retry and timeout settings
    pub async fn aws_config(&self) -> aws_config::SdkConfig {
        let retry_config = RetryConfig::standard()
            .with_max_attempts(3)
            .with_initial_backoff(Duration::from_millis(50));

        let timeout_config = TimeoutConfig::builder()
            .operation_timeout(Duration::from_secs(30))
            .build();

        let mut config_builder = aws_config::load_defaults(BehaviorVersion::latest())
            .await
            .to_builder()
            .region(Region::new(self.aws_region()))
            .retry_config(retry_config)
            .timeout_config(timeout_config);

        if let Some(endpoint_url) = self.override_aws_endpoint_url() {
            config_builder = config_builder.endpoint_url(endpoint_url);
        }

        config_builder.build()
    }

    /// AWS S3 service configuration
    pub async fn s3_client_config(&self) -> aws_sdk_s3::Config {
        let aws_config = self.aws_config().await;
        let s3_config: aws_sdk_s3::Config = (&aws_config).into();
        let mut builder = s3_config.to_builder();

        // Override "force path style" to true for compatibility with LocalStack
        // https://github.com/awslabs/aws-sdk-rust/discussions/874
        if matches!(self, Self::Development) {
            builder.set_force_path_style(Some(true));
        }

        builder.build()
    }
}
