use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use actix_cors::Cors;
use actix_web::{delete, get, web, App, HttpResponse, HttpServer, Responder};
use lru::LruCache;
use serde::Deserialize;

use rs_presage_core::config::PresageConfig;
use rs_presage_core::store::{open_store, NgramReader};
use rs_presage_core::Presage;

/// Session used when a request names none.
const DEFAULT_SESSION: &str = "default";

/// Sessions kept when `PRESAGE_MAX_SESSIONS` is not set.
const DEFAULT_MAX_SESSIONS: usize = 1024;

/// Query parameters of the `/v1/predict` endpoint
#[derive(Deserialize)]
struct PredictParams {
	text: Option<String>,
	session: Option<String>,
	multiplier: Option<usize>,
}

#[derive(Deserialize)]
struct SessionQuery {
	session: Option<String>,
}

/// Bounded set of named prediction sessions.
///
/// # Notes
/// - Holds at most `capacity` sessions; storing one more drops the least
///   recently used session.
/// - A session is taken out while it predicts. A concurrent request for the
///   same name gets a fresh session, and whichever request finishes last is
///   the one kept. Every request carries the full text, so this only loses
///   the other request's context-change tracking.
struct SessionPool {
	/// Template every new session is created from.
	template: Presage,
	sessions: LruCache<String, Presage>,
}

impl SessionPool {
	fn new(template: Presage, capacity: NonZeroUsize) -> Self {
		Self { template, sessions: LruCache::new(capacity) }
	}

	/// Takes the session `name` out of the pool, or starts a new one.
	fn checkout(&mut self, name: &str) -> Presage {
		match self.sessions.pop(name) {
			Some(session) => session,
			None => self.template.new_session(),
		}
	}

	/// Puts a session back as the most recently used one.
	fn checkin(&mut self, name: String, session: Presage) {
		if let Some((evicted, _)) = self.sessions.push(name.clone(), session) {
			if evicted != name {
				log::info!("session pool full ({} sessions), dropped session {evicted}", self.len());
			}
		}
	}

	/// Forgets a session; `false` if it was unknown.
	fn close(&mut self, name: &str) -> bool {
		self.sessions.pop(name).is_some()
	}

	fn len(&self) -> usize {
		self.sessions.len()
	}
}

struct SharedData {
	pool: SessionPool,
	orders: Vec<usize>,
}

impl SharedData {
	fn session_name(session: &Option<String>) -> String {
		match session {
			Some(s) if !s.trim().is_empty() => s.trim().to_owned(),
			_ => DEFAULT_SESSION.to_owned(),
		}
	}
}

/// Reads `PRESAGE_MAX_SESSIONS`, falling back to [`DEFAULT_MAX_SESSIONS`].
fn max_sessions() -> NonZeroUsize {
	std::env::var("PRESAGE_MAX_SESSIONS")
		.ok()
		.and_then(|value| value.trim().parse::<usize>().ok())
		.and_then(NonZeroUsize::new)
		.or(NonZeroUsize::new(DEFAULT_MAX_SESSIONS))
		.unwrap_or(NonZeroUsize::MIN)
}

/// HTTP GET endpoint `/v1/predict`
///
/// Predicts the next words after `text` in the given session and returns
/// them, best first, one per line.
#[get("/v1/predict")]
async fn get_predict(data: web::Data<Mutex<SharedData>>, query: web::Query<PredictParams>) -> impl Responder {
	let text = query.text.clone().unwrap_or_default();
	let name = SharedData::session_name(&query.session);
	if query.multiplier == Some(0) {
		return HttpResponse::BadRequest().body("Multiplier must be >= 1");
	}

	// The session leaves the pool while predicting so other sessions are not blocked.
	let mut session = {
		let mut shared_data = match data.lock() {
			Ok(m) => m,
			Err(_) => return HttpResponse::InternalServerError().body("Session lock failed"),
		};
		shared_data.pool.checkout(&name)
	};

	let multiplier = query.multiplier.unwrap_or(session.size_multiplier());
	let prediction = match web::block(move || {
		let prediction = session.predict_scored(&text, multiplier);
		(session, prediction)
	})
	.await
	{
		Ok((session, prediction)) => {
			if let Ok(mut shared_data) = data.lock() {
				shared_data.pool.checkin(name, session);
			}
			prediction
		}
		Err(e) => return HttpResponse::InternalServerError().body(format!("Prediction failed: {e}")),
	};

	HttpResponse::Ok().body(prediction.into_words().join("\n"))
}

/// HTTP GET endpoint `/v1/orders`
///
/// Lists the n-gram orders present in the store.
#[get("/v1/orders")]
async fn get_orders(data: web::Data<Mutex<SharedData>>) -> impl Responder {
	let shared_data = match data.lock() {
		Ok(m) => m,
		Err(_) => return HttpResponse::InternalServerError().body("Session lock failed"),
	};
	let orders: Vec<String> = shared_data.orders.iter().map(usize::to_string).collect();
	HttpResponse::Ok().body(orders.join("\n"))
}

/// HTTP DELETE endpoint `/v1/session`
///
/// Forgets the text typed in a session.
#[delete("/v1/session")]
async fn delete_session(data: web::Data<Mutex<SharedData>>, query: web::Query<SessionQuery>) -> impl Responder {
	let mut shared_data = match data.lock() {
		Ok(m) => m,
		Err(_) => return HttpResponse::InternalServerError().body("Session lock failed"),
	};
	let name = SharedData::session_name(&query.session);
	if shared_data.pool.close(&name) {
		HttpResponse::Ok().body(format!("Session {name} closed"))
	} else {
		HttpResponse::NotFound().body(format!("Unknown session {name}"))
	}
}

/// Main entry point for the server.
///
/// Loads the configuration from `PRESAGE_CONFIG` (default `./presage.toml`),
/// opens the configured n-gram store and starts an Actix-web HTTP server.
///
/// # Notes
/// - The server binds to 127.0.0.1:5000.
/// - At most `PRESAGE_MAX_SESSIONS` (default 1024) sessions are kept.
/// - The store is read-only here; fill it with `rs-presage-exemple` first.
#[actix_web::main]
async fn main() -> std::io::Result<()> {
	env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

	let config_path = std::env::var("PRESAGE_CONFIG").unwrap_or_else(|_| "./presage.toml".to_owned());
	let config = PresageConfig::load_or_default(&config_path);

	let store = open_store(&config.store).map_err(std::io::Error::other)?;
	let orders = store.orders();
	log::info!("serving n-gram orders {orders:?} from {} store", config.store.backend);

	let presage = Presage::new(&config, Arc::new(store)).map_err(std::io::Error::other)?;
	let capacity = max_sessions();
	log::info!("keeping at most {capacity} sessions");
	let shared_data = SharedData {
		pool: SessionPool::new(presage, capacity),
		orders,
	};
	let shared_data = web::Data::new(Mutex::new(shared_data));

	HttpServer::new(move || {
		App::new()
			.wrap(Cors::permissive())
			.app_data(shared_data.clone())
			.service(get_predict)
			.service(get_orders)
			.service(delete_session)
	})
		.bind(("127.0.0.1", 5000))?
		.run()
		.await
}

#[cfg(test)]
mod tests {
	use super::*;
	use rs_presage_core::store::{MemoryStore, NgramKey, NgramWriter, Normalization};

	fn pool(capacity: usize) -> SessionPool {
		let mut store = MemoryStore::new(Normalization::new(true, false));
		store.ensure_table(1).unwrap();
		store.upsert(&NgramKey::new(["hallo"]), 2).unwrap();
		let presage = Presage::new(&PresageConfig::default(), Arc::new(store)).unwrap();
		SessionPool::new(presage, NonZeroUsize::new(capacity).unwrap())
	}

	fn typed(pool: &mut SessionPool, name: &str, text: &str) {
		let mut session = pool.checkout(name);
		session.predict(text);
		pool.checkin(name.to_owned(), session);
	}

	#[test]
	fn test_session_keeps_its_text() {
		let mut pool = pool(4);
		typed(&mut pool, "a", "ha");
		assert_eq!(pool.checkout("a").tracker().past_stream(), "ha");
		assert_eq!(pool.checkout("b").tracker().past_stream(), "");
	}

	#[test]
	fn test_least_recently_used_session_is_dropped() {
		let mut pool = pool(2);
		typed(&mut pool, "a", "ha");
		typed(&mut pool, "b", "hal");
		typed(&mut pool, "a", "hall");
		typed(&mut pool, "c", "hallo ");

		assert_eq!(pool.len(), 2);
		assert!(!pool.close("b"));
		assert_eq!(pool.checkout("a").tracker().past_stream(), "hall");
		assert_eq!(pool.checkout("c").tracker().past_stream(), "hallo ");
	}

	#[test]
	fn test_pool_never_grows_past_capacity() {
		let mut pool = pool(3);
		for i in 0..100 {
			typed(&mut pool, &format!("s{i}"), "ha");
		}
		assert_eq!(pool.len(), 3);
		assert!(pool.close("s99"));
		assert!(!pool.close("s0"));
	}

	#[test]
	fn test_session_name() {
		assert_eq!(SharedData::session_name(&None), DEFAULT_SESSION);
		assert_eq!(SharedData::session_name(&Some("  ".to_owned())), DEFAULT_SESSION);
		assert_eq!(SharedData::session_name(&Some(" tab1 ".to_owned())), "tab1");
	}
}
