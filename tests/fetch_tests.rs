//! HTTP-level tests for the source implementations, served by wiremock

use std::time::{Duration, Instant};
use url::Url;
use volleysync::fetch::{
    build_http_client, CitySource, FederationSource, FetchError, HttpCitySource,
    HttpFederationSource, Outcome,
};
use volleysync::storage::{MatchStatus, Tournament};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn city_source(server: &MockServer, min_interval: Duration) -> HttpCitySource {
    let client = build_http_client("volleysync-test", 5).unwrap();
    let base = Url::parse(&format!("{}/", server.uri())).unwrap();
    HttpCitySource::new(client, base, min_interval)
}

fn federation_source(server: &MockServer) -> HttpFederationSource {
    let client = build_http_client("volleysync-test", 5).unwrap();
    let base = Url::parse(&format!("{}/", server.uri())).unwrap();
    HttpFederationSource::new(client, base, Duration::ZERO)
}

const CITY_MATCH_PAGE: &str = r#"
    <html><body><div class="match">
        <div class="match-date">12.03.2024 19:30</div>
        <div class="match-venue">Sports Hall 3</div>
        <div class="team-home"><a href="team.php?id=12">Spartak</a></div>
        <div class="team-away"><a href="team.php?id=7">Dynamo</a></div>
        <div class="match-score">3:1</div>
        <table class="protocol">
            <tbody data-team-id="12">
                <tr>
                    <td class="num">7</td>
                    <td class="player"><a href="player.php?id=55">Ivanov Ivan</a></td>
                    <td class="points">12</td><td class="attacks">8</td>
                    <td class="serves">2</td><td class="blocks">2</td>
                </tr>
            </tbody>
        </table>
    </div></body></html>
"#;

const CITY_SKELETON_PAGE: &str = r#"
    <html><body><div class="match"><div class="match-date"></div></div></body></html>
"#;

#[tokio::test]
async fn test_city_match_is_fetched_and_parsed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/match.php"))
        .and(query_param("id", "7"))
        .respond_with(ResponseTemplate::new(200).set_body_string(CITY_MATCH_PAGE))
        .mount(&server)
        .await;

    let source = city_source(&server, Duration::ZERO);
    let record = source.fetch_match(7).await.unwrap().found().unwrap();

    assert_eq!(record.status, MatchStatus::Played);
    assert_eq!(record.home_team.site_id, 12);
    assert_eq!(record.home_team.name, "Spartak");
    assert_eq!(record.home_score, Some(3));
    assert_eq!(record.stats.len(), 1);
    assert_eq!(record.stats[0].player_site_id, 55);
}

#[tokio::test]
async fn test_city_roster_is_fetched_and_parsed() {
    let server = MockServer::start().await;
    let page = r#"
        <html><body><div class="roster">
            <div class="roster-team"><a href="team.php?id=12">Spartak</a></div>
            <div class="roster-season">2023/24</div>
            <table class="members">
                <tr class="member">
                    <td class="num">9</td>
                    <td class="player"><a href="player.php?id=55">Ivanov Ivan</a></td>
                    <td class="height">192</td>
                </tr>
            </table>
        </div></body></html>
    "#;
    Mock::given(method("GET"))
        .and(path("/members.php"))
        .and(query_param("id", "31"))
        .respond_with(ResponseTemplate::new(200).set_body_string(page))
        .mount(&server)
        .await;

    let source = city_source(&server, Duration::ZERO);
    let record = source.fetch_roster(31).await.unwrap().found().unwrap();

    assert_eq!(record.team.site_id, 12);
    assert_eq!(record.season_label.as_deref(), Some("2023/24"));
    assert_eq!(record.players.len(), 1);
    assert_eq!(record.players[0].site_id, 55);
    assert_eq!(record.players[0].height, Some(192));
}

#[tokio::test]
async fn test_city_roster_404_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/members.php"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let source = city_source(&server, Duration::ZERO);
    let outcome = source.fetch_roster(404).await.unwrap();
    assert!(matches!(outcome, Outcome::NotFound));
}

#[tokio::test]
async fn test_city_404_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/match.php"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let source = city_source(&server, Duration::ZERO);
    let outcome = source.fetch_match(99).await.unwrap();
    assert_eq!(outcome, Outcome::NotFound);
}

#[tokio::test]
async fn test_city_skeleton_page_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/match.php"))
        .respond_with(ResponseTemplate::new(200).set_body_string(CITY_SKELETON_PAGE))
        .mount(&server)
        .await;

    let source = city_source(&server, Duration::ZERO);
    let outcome = source.fetch_match(12345).await.unwrap();
    assert_eq!(outcome, Outcome::NotFound);
}

#[tokio::test]
async fn test_city_server_error_is_transient() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/match.php"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let source = city_source(&server, Duration::ZERO);
    let result = source.fetch_match(7).await;
    assert!(matches!(
        result,
        Err(FetchError::Status { status: 503, .. })
    ));
}

#[tokio::test]
async fn test_city_page_without_match_container_is_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/match.php"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let source = city_source(&server, Duration::ZERO);
    let result = source.fetch_match(7).await;
    assert!(matches!(result, Err(FetchError::Malformed { .. })));
}

#[tokio::test]
async fn test_city_requests_are_paced() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/match.php"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let source = city_source(&server, Duration::from_millis(150));
    let started = Instant::now();
    source.fetch_match(1).await.unwrap();
    source.fetch_match(2).await.unwrap();
    assert!(started.elapsed() >= Duration::from_millis(150));
}

#[tokio::test]
async fn test_federation_season_probe() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/season/5"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(r#"<h1 class="season-name">2024/2025</h1>"#),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/season/6"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let source = federation_source(&server);
    let info = source.season_info(5).await.unwrap().found().unwrap();
    assert_eq!(info.number, 5);
    assert_eq!(info.name, "2024/2025");

    assert_eq!(source.season_info(6).await.unwrap(), Outcome::NotFound);
}

#[tokio::test]
async fn test_federation_schedule_is_fetched_per_draw() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/season/5/schedule"))
        .and(query_param("tournament", "championship"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"
            <table class="schedule">
                <tr>
                    <td class="match"><a href="/season/5/match/301">301</a></td>
                    <td class="date">01.11.2024 18:00</td>
                    <td class="home"><a href="/season/5/team/11">Start</a></td>
                    <td class="away"><a href="/season/5/team/12">Impuls</a></td>
                    <td class="score">3:2</td>
                </tr>
            </table>
        "#,
        ))
        .mount(&server)
        .await;
    // The cup draw was never held
    Mock::given(method("GET"))
        .and(path("/season/5/schedule"))
        .and(query_param("tournament", "cup"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let source = federation_source(&server);
    let entries = source.schedule(5, Tournament::Championship).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].match_site_id, 301);
    assert_eq!(entries[0].status, MatchStatus::Played);
    assert_eq!(entries[0].home_team.as_ref().map(|t| t.site_id), Some(11));

    let cup = source.schedule(5, Tournament::Cup).await.unwrap();
    assert!(cup.is_empty());
}

#[tokio::test]
async fn test_federation_match_detail_with_protocol() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/season/5/match/301"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"
            <div class="match">
                <div class="match-tournament">Championship</div>
                <div class="match-date">2024-11-01 18:00</div>
                <div class="team-home"><a href="/season/5/team/11">Start</a></div>
                <div class="team-away"><a href="/season/5/team/12">Impuls</a></div>
                <div class="match-score">3:2</div>
                <table class="protocol">
                    <tbody data-team-id="11">
                        <tr>
                            <td class="player"><a href="/season/5/player/501">Orlova Anna</a></td>
                            <td class="points">17</td>
                        </tr>
                    </tbody>
                </table>
                <div class="referees">
                    <a href="/season/5/referee/9">Smirnov Oleg</a>
                </div>
            </div>
        "#,
        ))
        .mount(&server)
        .await;

    let source = federation_source(&server);
    let detail = source.match_detail(5, 301).await.unwrap().found().unwrap();

    assert_eq!(detail.tournament, Some(Tournament::Championship));
    assert_eq!(detail.status, MatchStatus::Played);
    assert_eq!(detail.stats.len(), 1);
    assert_eq!(detail.stats[0].player_site_id, 501);
    assert_eq!(detail.stats[0].points, Some(17));
    assert_eq!(detail.referees.len(), 1);
    assert_eq!(detail.referees[0].site_id, 9);
}

#[tokio::test]
async fn test_federation_player_profile() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/season/5/player/77"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"
            <div class="player-profile">
                <h1 class="player-name">Orlova Anna</h1>
                <dd class="birth-date">12.03.1994</dd>
                <dd class="height">182 cm</dd>
            </div>
        "#,
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/season/5/player/78"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let source = federation_source(&server);
    let player = source.player(5, 77).await.unwrap().found().unwrap();
    assert_eq!(player.last_name, "Orlova");
    assert_eq!(player.first_name, "Anna");
    assert_eq!(player.height, Some(182));

    assert_eq!(source.player(5, 78).await.unwrap(), Outcome::NotFound);
}

#[tokio::test]
async fn test_federation_referee_roster() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/season/5/referees"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"
            <ul class="referee-list">
                <li><a href="/season/5/referee/9">Smirnov Oleg</a></li>
            </ul>
        "#,
        ))
        .mount(&server)
        .await;

    let source = federation_source(&server);
    let roster = source.referees(5).await.unwrap();
    assert_eq!(roster.len(), 1);
    assert_eq!(roster[0].site_id, 9);
    assert_eq!(roster[0].last_name, "Smirnov");
}
