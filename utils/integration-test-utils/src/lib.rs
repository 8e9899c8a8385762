/********************************************************************************
 * Copyright (c) 2024 Contributors to the Eclipse Foundation
 *
 * See the NOTICE file(s) distributed with this work for additional
 * information regarding copyright ownership.
 *
 * This program and the accompanying materials are made available under the
 * terms of the Apache License Version 2.0 which is available at
 * https://www.apache.org/licenses/LICENSE-2.0
 *
 * SPDX-License-Identifier: Apache-2.0
 ********************************************************************************/

mod integration_test_logging;
pub use integration_test_logging::init_logging;

mod integration_test_consumers;
pub use integration_test_consumers::{EchoConsumer, HoldingConsumer, TestProducer};

mod integration_test_subscribers;
pub use integration_test_subscribers::{CollectingSubscriber, StreamSignal};

mod integration_test_engine;
pub use integration_test_engine::LoopbackEngine;
