//! [`PeerTransport`] over a real `RTCPeerConnection` with one data channel.

use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::APIBuilder;
use webrtc::data_channel::data_channel_message::DataChannelMessage;
use webrtc::data_channel::data_channel_state::RTCDataChannelState;
use webrtc::data_channel::RTCDataChannel;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::sdp_type::RTCSdpType;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection;

use peerchat_shared::constants::DATA_CHANNEL_LABEL;

use crate::error::NetError;
use crate::signal::{SdpKind, SignalBlob};
use crate::transport::{ChannelEvent, PeerTransport, TransportConfig};

pub struct WebRtcTransport {
    pc: Arc<RTCPeerConnection>,
    /// Created locally by the initiator, announced by the remote for the
    /// responder.
    channel: Arc<Mutex<Option<Arc<RTCDataChannel>>>>,
    events: mpsc::Sender<ChannelEvent>,
    config: TransportConfig,
}

impl WebRtcTransport {
    pub async fn new(
        config: TransportConfig,
        events: mpsc::Sender<ChannelEvent>,
    ) -> Result<Self, NetError> {
        let mut media = MediaEngine::default();
        media.register_default_codecs()?;
        let registry = register_default_interceptors(Registry::new(), &mut media)?;

        let api = APIBuilder::new()
            .with_media_engine(media)
            .with_interceptor_registry(registry)
            .build();

        let rtc_config = RTCConfiguration {
            ice_servers: vec![RTCIceServer {
                urls: config.ice_urls.clone(),
                ..Default::default()
            }],
            ..Default::default()
        };

        let pc = Arc::new(api.new_peer_connection(rtc_config).await?);
        let channel: Arc<Mutex<Option<Arc<RTCDataChannel>>>> = Arc::new(Mutex::new(None));

        {
            let channel = channel.clone();
            let events = events.clone();
            pc.on_data_channel(Box::new(move |dc: Arc<RTCDataChannel>| {
                let channel = channel.clone();
                let events = events.clone();
                Box::pin(async move {
                    debug!(label = %dc.label(), "Remote data channel announced");
                    wire_channel(&dc, events);
                    if let Ok(mut slot) = channel.lock() {
                        *slot = Some(dc);
                    }
                })
            }));
        }

        {
            let events = events.clone();
            pc.on_peer_connection_state_change(Box::new(move |state: RTCPeerConnectionState| {
                let events = events.clone();
                Box::pin(async move {
                    debug!(%state, "Peer connection state changed");
                    if state == RTCPeerConnectionState::Failed {
                        let _ = events
                            .send(ChannelEvent::Failed("peer connection failed".into()))
                            .await;
                    }
                })
            }));
        }

        info!(ice = ?config.ice_urls, "Peer connection created");

        Ok(Self {
            pc,
            channel,
            events,
            config,
        })
    }

    /// Set the local description and wait until every candidate is in it.
    async fn gather(&self, desc: RTCSessionDescription) -> Result<SignalBlob, NetError> {
        let mut complete = self.pc.gathering_complete_promise().await;
        self.pc.set_local_description(desc).await?;

        match self.config.gather_timeout {
            Some(limit) => {
                tokio::time::timeout(limit, complete.recv())
                    .await
                    .map_err(|_| {
                        NetError::TransportFailure("ICE candidate gathering timed out".into())
                    })?;
            }
            None => {
                let _ = complete.recv().await;
            }
        }

        let local = self.pc.local_description().await.ok_or_else(|| {
            NetError::TransportFailure("no local description after gathering".into())
        })?;
        from_rtc(local)
    }

    fn set_channel(&self, dc: Arc<RTCDataChannel>) {
        if let Ok(mut slot) = self.channel.lock() {
            *slot = Some(dc);
        }
    }

    fn current_channel(&self) -> Option<Arc<RTCDataChannel>> {
        self.channel.lock().ok().and_then(|slot| slot.clone())
    }
}

impl PeerTransport for WebRtcTransport {
    async fn create_offer(&self) -> Result<SignalBlob, NetError> {
        let dc = self.pc.create_data_channel(DATA_CHANNEL_LABEL, None).await?;
        wire_channel(&dc, self.events.clone());
        self.set_channel(dc);

        let offer = self.pc.create_offer(None).await?;
        self.gather(offer).await
    }

    async fn create_answer(&self, offer: &SignalBlob) -> Result<SignalBlob, NetError> {
        self.pc
            .set_remote_description(to_rtc(offer)?)
            .await
            .map_err(|e| NetError::MalformedSignal(format!("offer rejected: {e}")))?;

        let answer = self.pc.create_answer(None).await?;
        self.gather(answer).await
    }

    async fn apply_answer(&self, answer: &SignalBlob) -> Result<(), NetError> {
        self.pc
            .set_remote_description(to_rtc(answer)?)
            .await
            .map_err(|e| NetError::MalformedSignal(format!("answer rejected: {e}")))
    }

    async fn send(&self, text: &str) -> Result<(), NetError> {
        let dc = self
            .current_channel()
            .ok_or_else(|| NetError::TransportFailure("no data channel".into()))?;
        if dc.ready_state() != RTCDataChannelState::Open {
            return Err(NetError::TransportFailure("data channel is not open".into()));
        }
        dc.send_text(text.to_owned()).await?;
        Ok(())
    }

    async fn close(&self) -> Result<(), NetError> {
        self.pc.close().await?;
        let _ = self.events.try_send(ChannelEvent::Closed);
        Ok(())
    }
}

fn wire_channel(dc: &Arc<RTCDataChannel>, events: mpsc::Sender<ChannelEvent>) {
    let label = dc.label().to_owned();

    {
        let events = events.clone();
        dc.on_open(Box::new(move || {
            Box::pin(async move {
                info!(%label, "Data channel open");
                let _ = events.send(ChannelEvent::Opened).await;
            })
        }));
    }

    {
        let events = events.clone();
        dc.on_message(Box::new(move |msg: DataChannelMessage| {
            let events = events.clone();
            Box::pin(async move {
                match String::from_utf8(msg.data.to_vec()) {
                    Ok(text) => {
                        let _ = events.send(ChannelEvent::Data(text)).await;
                    }
                    Err(_) => warn!("Dropping non-UTF-8 data channel frame"),
                }
            })
        }));
    }

    dc.on_close(Box::new(move || {
        let events = events.clone();
        Box::pin(async move {
            debug!("Data channel closed");
            let _ = events.send(ChannelEvent::Closed).await;
        })
    }));
}

fn to_rtc(blob: &SignalBlob) -> Result<RTCSessionDescription, NetError> {
    let desc = match blob.kind {
        SdpKind::Offer => RTCSessionDescription::offer(blob.sdp.clone()),
        SdpKind::Answer => RTCSessionDescription::answer(blob.sdp.clone()),
    };
    desc.map_err(|e| NetError::MalformedSignal(format!("unparseable SDP: {e}")))
}

fn from_rtc(desc: RTCSessionDescription) -> Result<SignalBlob, NetError> {
    match desc.sdp_type {
        RTCSdpType::Offer => Ok(SignalBlob::offer(desc.sdp)),
        RTCSdpType::Answer => Ok(SignalBlob::answer(desc.sdp)),
        other => Err(NetError::TransportFailure(format!(
            "unexpected local description type {other}"
        ))),
    }
}
