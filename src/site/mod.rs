//! Catalog pages of the site: search results and the per-title episode listing.

use crate::client::{Fetch, HttpFetcher};
use anyhow::{Context, Result};
use scraper::{ElementRef, Html, Selector};
use std::fmt;
use std::sync::{Arc, LazyLock};
use tracing::debug;
use url::Url;

static CARD_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse(".bsx").unwrap());
static LINK_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a").unwrap());
static CARD_TITLE_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("h2").unwrap());
static ENTRY_TITLE_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".entry-title").unwrap());
static EPISODE_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".eplister li").unwrap());
static EPISODE_NUM_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".epl-num").unwrap());
static EPISODE_TITLE_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".epl-title").unwrap());

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnimeInfo {
    pub id: String,
    pub title: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpisodeInfo {
    pub num: String,
    pub title: String,
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct Anime {
    pub info: AnimeInfo,
    pub episodes: Vec<EpisodeInfo>,
}

impl fmt::Display for AnimeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:>4} | {}", self.id, self.title)
    }
}

impl fmt::Display for EpisodeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:>3} | {}", self.num, self.title)
    }
}

pub struct SiteClient {
    fetcher: Arc<HttpFetcher>,
    host: String,
}

impl SiteClient {
    pub fn new(fetcher: Arc<HttpFetcher>, host: &str) -> Self {
        Self {
            fetcher,
            host: host.trim_end_matches('/').to_string(),
        }
    }

    pub async fn search(&self, query: &str) -> Result<Vec<AnimeInfo>> {
        let mut url = Url::parse(&format!("{}/search", self.host))
            .with_context(|| format!("Invalid site host {}", self.host))?;
        url.query_pairs_mut().append_pair("keyword", query);

        let html = self
            .fetcher
            .fetch_text(url.as_str(), None)
            .await
            .context("Search request failed")?;
        let results = parse_search_results(&html, &self.host);
        debug!("Search for {:?} returned {} results", query, results.len());
        Ok(results)
    }

    pub async fn get_anime(&self, id: &str) -> Result<Anime> {
        let url = format!("{}/detail/id/{}", self.host, id);
        let (final_url, body) = self
            .fetcher
            .fetch_with_url(&url, None)
            .await
            .with_context(|| format!("Failed to load anime {}", id))?;

        let html = String::from_utf8_lossy(&body);
        Ok(parse_anime_page(&html, id, &final_url))
    }
}

/// Last path segment of a detail URL.
pub fn id_from_url(url: &str) -> String {
    url.trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .to_string()
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

pub fn parse_search_results(html: &str, host: &str) -> Vec<AnimeInfo> {
    let document = Html::parse_document(html);

    document
        .select(&CARD_SELECTOR)
        .filter_map(|card| {
            let href = card.select(&LINK_SELECTOR).next()?.value().attr("href")?;
            let title = card
                .select(&CARD_TITLE_SELECTOR)
                .next()
                .map(element_text)
                .unwrap_or_default();
            let url = if href.starts_with("http") {
                href.to_string()
            } else {
                format!("{}{}", host.trim_end_matches('/'), href)
            };

            Some(AnimeInfo {
                id: id_from_url(&url),
                title,
                url,
            })
        })
        .collect()
}

pub fn parse_anime_page(html: &str, id: &str, url: &str) -> Anime {
    let document = Html::parse_document(html);

    let title = document
        .select(&ENTRY_TITLE_SELECTOR)
        .next()
        .map(element_text)
        .unwrap_or_default();

    let episodes = document
        .select(&EPISODE_SELECTOR)
        .map(|item| EpisodeInfo {
            url: item
                .select(&LINK_SELECTOR)
                .next()
                .and_then(|a| a.value().attr("href"))
                .unwrap_or_default()
                .to_string(),
            num: item
                .select(&EPISODE_NUM_SELECTOR)
                .next()
                .map(element_text)
                .unwrap_or_default(),
            title: item
                .select(&EPISODE_TITLE_SELECTOR)
                .next()
                .map(element_text)
                .unwrap_or_default(),
        })
        .collect();

    Anime {
        info: AnimeInfo {
            id: id.to_string(),
            title,
            url: url.to_string(),
        },
        episodes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const SEARCH_HTML: &str = r#"
        <div class="listupd">
          <article class="bs"><div class="bsx">
            <a href="/detail/id/512" title="x"><div class="tt"><h2 itemprop="headline">Mushoku Tensei</h2></div></a>
          </div></article>
          <article class="bs"><div class="bsx">
            <a href="https://anilife.live/detail/id/77/"><h2>Frieren</h2></a>
          </div></article>
          <article class="bs"><div class="bsx"><span>no link</span></div></article>
        </div>"#;

    const DETAIL_HTML: &str = r#"
        <h1 class="entry-title"> Frieren </h1>
        <div class="eplister"><ul>
          <li><a href="https://anilife.live/ani/provider/1"><div class="epl-num">1</div><div class="epl-title">Journey's End</div></a></li>
          <li><a href="https://anilife.live/ani/provider/2"><div class="epl-num">2</div><div class="epl-title">Magic</div></a></li>
        </ul></div>"#;

    #[test]
    fn test_parse_search_results() {
        let results = parse_search_results(SEARCH_HTML, "https://anilife.live");

        assert_eq!(
            results,
            vec![
                AnimeInfo {
                    id: "512".to_string(),
                    title: "Mushoku Tensei".to_string(),
                    url: "https://anilife.live/detail/id/512".to_string(),
                },
                AnimeInfo {
                    id: "77".to_string(),
                    title: "Frieren".to_string(),
                    url: "https://anilife.live/detail/id/77/".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_parse_anime_page() {
        let anime = parse_anime_page(DETAIL_HTML, "77", "https://anilife.live/detail/id/77");

        assert_eq!(anime.info.title, "Frieren");
        assert_eq!(anime.episodes.len(), 2);
        assert_eq!(anime.episodes[0].num, "1");
        assert_eq!(anime.episodes[0].title, "Journey's End");
        assert_eq!(anime.episodes[1].url, "https://anilife.live/ani/provider/2");
    }

    #[test]
    fn test_parse_empty_pages() {
        assert!(parse_search_results("<html></html>", "https://anilife.live").is_empty());
        let anime = parse_anime_page("", "1", "u");
        assert!(anime.episodes.is_empty());
        assert_eq!(anime.info.title, "");
    }

    #[test]
    fn test_id_from_url() {
        assert_eq!(id_from_url("https://anilife.live/detail/id/512"), "512");
        assert_eq!(id_from_url("https://anilife.live/detail/id/512/"), "512");
        assert_eq!(id_from_url(""), "");
    }

    #[test]
    fn test_display() {
        let info = AnimeInfo {
            id: "7".into(),
            title: "Title".into(),
            url: String::new(),
        };
        assert_eq!(info.to_string(), "   7 | Title");
    }

    #[tokio::test]
    async fn test_search_encodes_query() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("keyword", "무직전생 2"))
            .respond_with(ResponseTemplate::new(200).set_body_string(SEARCH_HTML))
            .expect(1)
            .mount(&server)
            .await;

        let fetcher =
            HttpFetcher::new("test-agent", &server.uri(), Duration::from_secs(5)).unwrap();
        let site = SiteClient::new(Arc::new(fetcher), &server.uri());

        let results = site.search("무직전생 2").await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].url, format!("{}/detail/id/512", server.uri()));
    }

    #[tokio::test]
    async fn test_get_anime_records_final_url() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/detail/id/77"))
            .respond_with(
                ResponseTemplate::new(302)
                    .insert_header("location", format!("{}/frieren", server.uri()).as_str()),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/frieren"))
            .respond_with(ResponseTemplate::new(200).set_body_string(DETAIL_HTML))
            .mount(&server)
            .await;

        let fetcher =
            HttpFetcher::new("test-agent", &server.uri(), Duration::from_secs(5)).unwrap();
        let site = SiteClient::new(Arc::new(fetcher), &server.uri());

        let anime = site.get_anime("77").await.unwrap();
        assert_eq!(anime.info.id, "77");
        assert_eq!(anime.info.url, format!("{}/frieren", server.uri()));
        assert_eq!(anime.episodes.len(), 2);
    }
}
