mod test_session_limit;
mod test_ws_relay;
