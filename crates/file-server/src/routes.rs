//! Request routing.

use std::io::SeekFrom;
use std::sync::Arc;

use nsdrop_announce::AnnounceError;
use nsdrop_manifest::{FILES_ROUTE, ManifestError, build_manifest, resolve_download_path};
use tokio::io::AsyncSeekExt;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, error, info, info_span, warn};

use crate::DESTINATION_FIELD;
use crate::http::{Body, Method, Request, Response, Status, form_field};
use crate::range::ByteRange;
use crate::server::FileServer;

/// Operator page: one field for the console address.
pub(crate) const INDEX_PAGE: &str = r##"<!DOCTYPE html><html lang="en"><head><meta charset="UTF-8"><title>Select switch IP to connect to</title><style>p, #switch {font-size: 8vw;}button{width:100%;height: 80px;background-color: #EFA6A2;font-size: 3vw;}</style></head>
<body><p>select switch IP to connect to</p><form action="#" method="post"><input type="text" id="switch" name="switch" value="192.168.1.17"><button type="submit">go</button></form></body></html>"##;

pub(crate) async fn dispatch(
    server: &FileServer,
    request: &Request,
    cancel: &CancellationToken,
) -> Response {
    let path = request.path();

    if path == "/" {
        return match request.method {
            Method::Get | Method::Head => Response::html(Status::Ok, INDEX_PAGE),
            Method::Post => announce(server, request, cancel).await,
            Method::Other(_) => Response::status(Status::NotImplemented),
        };
    }

    if let Some(announced) = path.strip_prefix(FILES_ROUTE) {
        return match request.method {
            Method::Get | Method::Head => serve_file(server, request, announced).await,
            _ => Response::status(Status::NotImplemented),
        };
    }

    Response::status(Status::NotFound)
}

/// Scans the configured roots and pushes the list to the submitted console.
async fn announce(server: &FileServer, request: &Request, cancel: &CancellationToken) -> Response {
    let destination = form_field(&request.body, DESTINATION_FIELD).unwrap_or_default();
    let destination = destination.trim().to_string();
    if destination.is_empty() {
        warn!("console destination empty");
        return Response::status(Status::BadRequest);
    }

    let cycle_id = uuid::Uuid::new_v4();
    let span = info_span!("announce", %cycle_id, %destination);

    async {
        info!("contacting console");

        let scan = Arc::clone(&server.config().scan);
        let manifest = match tokio::task::spawn_blocking(move || build_manifest(&scan)).await {
            Ok(Ok(manifest)) => manifest,
            Ok(Err(e @ ManifestError::ScanRootUnavailable { .. })) => {
                error!("could not scan folders: {e}");
                return Response::status(Status::InternalServerError);
            }
            Ok(Err(e)) => {
                error!("manifest build failed: {e}");
                return Response::status(Status::InternalServerError);
            }
            Err(e) => {
                error!("scan task failed: {e}");
                return Response::status(Status::InternalServerError);
            }
        };

        match server
            .announcer()
            .announce(&destination, &manifest, cancel.clone())
            .await
        {
            Ok(report) => {
                info!(
                    entries = manifest.len(),
                    bytes = report.bytes_written,
                    ack = ?report.ack,
                    "all files announced"
                );
                Response::html(Status::Ok, INDEX_PAGE)
            }
            Err(AnnounceError::EmptyDestination) => Response::status(Status::BadRequest),
            Err(e) if e.is_connect_failure() => {
                error!("can't connect to console: {e}");
                Response::status(Status::InternalServerError)
            }
            Err(e) => {
                error!("announce failed: {e}");
                Response::status(Status::InternalServerError)
            }
        }
    }
    .instrument(span)
    .await
}

/// Serves package bytes for `/files/<announced>`.
async fn serve_file(server: &FileServer, request: &Request, announced: &str) -> Response {
    let base_root = &server.config().scan.base_root;
    let path = match resolve_download_path(base_root, announced) {
        Ok(path) => path,
        Err(e) => {
            warn!(uri = %request.target, "rejected download: {e}");
            return Response::status(Status::BadRequest);
        }
    };

    let mut file = match tokio::fs::File::open(&path).await {
        Ok(file) => file,
        Err(e) => {
            warn!(path = %path.display(), "cannot open download: {e}");
            return Response::status(Status::NotFound);
        }
    };

    let metadata = match file.metadata().await {
        Ok(m) if m.is_file() => m,
        Ok(_) => return Response::status(Status::NotFound),
        Err(e) => {
            error!(path = %path.display(), "cannot stat download: {e}");
            return Response::status(Status::InternalServerError);
        }
    };
    let len = metadata.len();

    match ByteRange::parse(request.header("range"), len) {
        ByteRange::Full => Response::new(
            Status::Ok,
            "application/octet-stream",
            Body::File { file, len },
        )
        .with_header("Accept-Ranges", "bytes"),
        ByteRange::Partial { start, end } => {
            if let Err(e) = file.seek(SeekFrom::Start(start)).await {
                error!(path = %path.display(), "seek failed: {e}");
                return Response::status(Status::InternalServerError);
            }
            Response::new(
                Status::PartialContent,
                "application/octet-stream",
                Body::File {
                    file,
                    len: end - start + 1,
                },
            )
            .with_header("Accept-Ranges", "bytes")
            .with_header("Content-Range", format!("bytes {start}-{end}/{len}"))
        }
        ByteRange::Unsatisfiable => Response::status(Status::RangeNotSatisfiable)
            .with_header("Content-Range", format!("bytes */{len}")),
    }
}
